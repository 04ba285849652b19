#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory holding one CSV file per table.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }

    pub fn arg(&self, name: &str) -> String {
        self.temp_dir.path().join(name).display().to_string()
    }
}

/// A small parent/child pair: every `orders.site` value is a `sites.site` value.
pub fn write_sites_and_orders(workspace: &TestWorkspace) {
    workspace.write(
        "data/sites.csv",
        "site,name,opened\n1,North,2019-04-01\n2,South & East,2020-11-15\n3,West,\n",
    );
    workspace.write(
        "data/orders.csv",
        "id,site,amount,placed\n10,1,12.50,2024-01-01 09:30:00\n11,2,7,2024-01-02 17:05:00\n12,1,3.25,2024-01-03 08:00:00\n",
    );
}
