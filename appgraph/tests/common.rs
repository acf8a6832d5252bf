use std::fs;
use std::path::Path;

use appgraph::{BuildArgs, SourceArgs};
use tempfile::TempDir;

#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub build: BuildArgs,
}

fn write(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// A source repository with one app and a fork of it.
pub fn init_test_context() -> anyhow::Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path();

    write(
        &root.join("play/org.example.notes.json"),
        r#"{"docId": "org.example.notes", "title": "Notes", "aggregateRating": {"starRating": 0}}"#,
    )?;
    write(
        &root.join("repositories.csv"),
        "id,full_name,owner_login,name,parent_id,source_id,packages\n\
         1,dev/notes,dev,notes,-1,-1,org.example.notes\n\
         2,fork/notes,fork,notes,1,-1,org.example.notes\n",
    )?;
    write(
        &root.join("details/1/commits.csv"),
        "id,title,author_email,author_name,authored_date,parent_ids\n\
         c1,init,dev@example.org,Dev,2014-02-27T15:05:06+01:00,\n\
         c2,next,dev@example.org,Dev,2014-02-28T15:05:06+01:00,c1\n\
         c3,more,dev@example.org,Dev,2014-03-01T15:05:06+01:00,c2\n",
    )?;

    let build = BuildArgs {
        sources: SourceArgs {
            play_details_dir: root.join("play"),
            repo_details_dir: root.join("details"),
            repository_list: root.join("repositories.csv"),
        },
        base_path: root.join("out"),
        commit_chunk_rows: None,
    };
    Ok(TestContext { temp_dir, build })
}
