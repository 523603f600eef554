use std::path::{Component, Path, PathBuf};

/// Join `relative` onto `root`, refusing anything that could point outside of `root`:
/// absolute paths, drive prefixes and `..` components.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut pushed = false;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    pushed.then_some(resolved)
}
