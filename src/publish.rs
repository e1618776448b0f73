use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Moves every entry of `source` into `target`, replacing entries of the same
/// name. Returns the number of entries moved.
pub async fn publish_dir(source: &Path, target: &Path) -> io::Result<usize> {
    let mut entries = fs::read_dir(source).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }

    fs::create_dir_all(target).await?;
    for name in &names {
        let from = source.join(name);
        let destination = target.join(name);
        remove_existing(&destination).await?;
        move_entry(&from, &destination).await?;
        debug!("Moved {} -> {}", from.display(), destination.display());
    }
    Ok(names.len())
}

async fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// rename(2), falling back to copy + delete when source and target are on
/// different filesystems.
async fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_recursive(from, to).await?;
            remove_existing(from).await
        }
        Err(e) => Err(e),
    }
}

async fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        if fs::symlink_metadata(&src).await?.is_dir() {
            fs::create_dir_all(&dst).await?;
            let mut entries = fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push((entry.path(), dst.join(entry.file_name())));
            }
        } else {
            fs::copy(&src, &dst).await?;
        }
    }
    Ok(())
}
