use std::fs;
use std::path::Path;

use appfetcher::LoaderParams;
use tempfile::TempDir;

#[allow(dead_code)]
pub struct Fixture {
    pub dir: TempDir,
    pub params: LoaderParams,
}

const REPOSITORY_LIST: &str = "\
id,full_name,owner_login,name,description,created_at,forks_count,stargazers_count,subscribers_count,watchers_count,network_count,owner_type,parent_id,source_id,packages
1,dev/notes,dev,notes,\"Notes, simple\",2014-02-27T15:05:06+01:00,1,10,2,10,1,User,-1,-1,org.example.notes
2,fork/notes,fork,notes,,2015-03-27T19:25:23.000-08:00,0,0,0,0,1,Organization,1,1,org.example.fork
3,other/lib,other,lib,,,0,0,0,0,0,User,99,99,org.example.lib
,broken/row,broken,row,,,,,,,,User,-1,-1,org.example.broken
";

const COMMIT_HEADER: &str = "id,short_id,title,message,additions,deletions,total,author_name,author_email,committer_name,committer_email,authored_date,committed_date,parent_ids\n";

const C1: &str = "c1,c1,init,\"Initial commit, with \"\"quotes\"\"\nand a second line\",,,,Dev,dev@example.org,Dev,dev@example.org,2014-02-27T15:05:06+01:00,2014-02-27T15:05:06+01:00,\n";
const C1_WITH_STATS: &str = "c1,c1,init,\"Initial commit, with \"\"quotes\"\"\nand a second line\",5,0,5,Dev,dev@example.org,Dev,dev@example.org,2014-02-27T15:05:06+01:00,2014-02-27T15:05:06+01:00,\n";
const C2: &str = "c2,c2,second,Second,1,1,2,Dev,dev@example.org,Dev,dev@example.org,2015-03-27T19:25:23.000-08:00,2015-03-27T19:25:23.000-08:00,c1\n";
const C3: &str = "c3,c3,fork work,Fork,2,0,2,Forker,fork@example.org,Forker,fork@example.org,2016-01-01T00:00:00Z,2016-01-01T00:00:00Z,c2\n";

fn write(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Three repositories (a source, its fork, and one forked from outside the
/// dataset), four listings and one category-only listing.
#[allow(dead_code)]
pub fn write_fixture() -> anyhow::Result<Fixture> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    let play = root.join("play");
    write(
        &play.join("org.example.notes.json"),
        r#"{
            "docId": "org.example.notes",
            "shareUrl": "https://play.google.com/store/apps/details?id=org.example.notes",
            "title": "Notes; \\N simple",
            "aggregateRating": {"starRating": 4.5},
            "offer": [{"formattedAmount": "Free", "currencyCode": "USD"}],
            "details": {"appDetails": {
                "appCategory": ["Productivity"],
                "versionCode": 12,
                "uploadDate": "Mar 27, 2015",
                "permission": ["android.permission.INTERNET"]
            }}
        }"#,
    )?;
    write(
        &play.join("org.example.fork.json"),
        r#"{"docId": "org.example.fork", "title": "Fork", "details": {"appDetails": {"permission": []}}}"#,
    )?;
    write(&play.join("org.example.noid.json"), r#"{"title": "No id"}"#)?;
    write(
        &play.join("categories/org.example.notes.json"),
        r#"{"appCategory": "Tools"}"#,
    )?;
    write(
        &play.join("categories/org.example.catonly.json"),
        r#"{"appCategory": "Games"}"#,
    )?;

    let repositories = root.join("repositories.csv");
    write(&repositories, REPOSITORY_LIST)?;

    let details = root.join("details");
    write(
        &details.join("1/snapshot.csv"),
        "web_url,created_at\nhttps://git.example.org/dev/notes,2008-09-03T20:56:35.450686Z\n",
    )?;
    write(
        &details.join("1/commits.csv"),
        &format!("{COMMIT_HEADER}{C1}{C2}"),
    )?;
    write(&details.join("1/branches.csv"), "branch_name,commit_hash\nmain,c2\n")?;
    write(
        &details.join("1/tags.csv"),
        "tag_name,tag_message,commit_hash\nv1,first release,c1\nv2\n",
    )?;
    write(
        &details.join("1/paths.csv"),
        "package,manifest_path,build_path\norg.example.notes,app/src/main/AndroidManifest.xml,app/build.gradle\n",
    )?;
    write(
        &details.join("2/commits.csv"),
        &format!("{COMMIT_HEADER}{C1_WITH_STATS}{C2}{C3}"),
    )?;
    write(&details.join("2/branches.csv"), "branch_name,commit_hash\nmain,c3\n")?;
    write(
        &details.join("2/paths.csv"),
        "package,manifest_path,build_path\norg.example.fork,AndroidManifest.xml,build.gradle\n",
    )?;

    let params = LoaderParams {
        play_details_dir: play,
        repo_details_dir: details,
        repository_list: repositories,
    };
    Ok(Fixture { dir, params })
}
