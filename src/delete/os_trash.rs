use std::path::Path;

pub trait OsTrash {
    fn delete(&self, path: &Path) -> Result<(), String>;
}

pub struct SystemTrash;

impl OsTrash for SystemTrash {
    fn delete(&self, path: &Path) -> Result<(), String> {
        trash::delete(path).map_err(|e| format!("move {} to trash: {e}", path.display()))
    }
}
