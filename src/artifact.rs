//! Local blocklist artifact: the newline-delimited snapshot of a feed's
//! final block-set, used for the no-op short-circuit between runs.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Render the final block-set as a newline-terminated text file.
pub fn render(domains: &[String]) -> String {
    let mut out = String::with_capacity(domains.iter().map(|d| d.len() + 1).sum());
    for d in domains {
        out.push_str(d);
        out.push('\n');
    }
    out
}

/// Compare the candidate content against the artifact from the previous
/// run. Missing or unreadable files count as changed.
pub fn unchanged(path: &Path, content: &str) -> bool {
    match fs::read_to_string(path) {
        Ok(previous) => previous.trim_end() == content.trim_end(),
        Err(_) => false,
    }
}

/// Atomically replace the artifact: write to a temp file in the same
/// directory, then rename over the target.
pub fn write(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .context("Failed to create temporary file")?;

    tmp.write_all(content.as_bytes())
        .context("Failed to write artifact content")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to persist artifact to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn domains(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_newline_terminated() {
        let content = render(&domains(&["a.com", "b.com"]));
        assert_eq!(content, "a.com\nb.com\n");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_unchanged_missing_file() {
        let dir = tempdir().unwrap();
        assert!(!unchanged(&dir.path().join("missing.txt"), "a.com\n"));
    }

    #[test]
    fn test_write_then_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocklist.txt");
        let content = render(&domains(&["a.com", "b.com"]));

        write(&path, &content).unwrap();
        assert!(unchanged(&path, &content));
        assert!(!unchanged(&path, "a.com\nc.com\n"));
    }

    #[test]
    fn test_unchanged_tolerates_trailing_whitespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocklist.txt");
        std::fs::write(&path, "a.com\nb.com").unwrap();
        assert!(unchanged(&path, "a.com\nb.com\n"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deep/blocklist.txt");
        write(&path, "a.com\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a.com\n");
    }

    #[test]
    fn test_write_overwrites_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocklist.txt");
        write(&path, "old.com\n").unwrap();
        write(&path, "new.com\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new.com\n");
    }
}
