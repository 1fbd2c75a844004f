use std::path::{Path, PathBuf};

/// Renders a path for diagnostics, preferring the canonical form and falling
/// back to a normalized absolute path when the target does not exist (yet).
pub fn best_effort_path_display(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => {
            let absolute_path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                match std::env::current_dir() {
                    Ok(current_dir) => current_dir.join(path),
                    Err(_) => path.to_path_buf(),
                }
            };

            normalize_path(&absolute_path).display().to_string()
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(components.last(), Some(std::path::Component::RootDir))
                {
                    components.pop();
                }
            }
            _ => {
                components.push(component);
            }
        }
    }

    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_cur_dir_components() {
        let normalized = normalize_path(Path::new("/a/./b/./c"));
        assert_eq!(normalized, PathBuf::from("/a/b/c"));
    }

    #[test]
    fn test_normalize_resolves_parent_components() {
        let normalized = normalize_path(Path::new("/a/b/../c"));
        assert_eq!(normalized, PathBuf::from("/a/c"));
    }

    #[test]
    fn test_nonexistent_path_is_still_displayable() {
        let display = Path::new("/definitely/not/there").best_effort_path_display();
        assert!(display.contains("definitely"));
    }
}
