use std::collections::{BTreeSet, HashMap};

use graphstore::{
    fetch::GraphData,
    schemas::{
        App, Branch, Commit, ContributeRelation, Contributor, GeneralRelation, GitHubRepository,
        GooglePlayPage, ImplementedRelation, NodeLabel, NodeRef, OwnerType, RelationType, Tag,
    },
};
use serde_json::{json, Value};

use crate::error::{FetchError, Result};
use crate::models::{
    CommitRow, PathRow, PlayListing, RepositoryRecord, RepositoryRow, SnapshotRow, SourceRecords,
};
use crate::parse::{
    int_cell, int_value, json_path, parse_iso8601, parse_upload_date, split_list, star_rating,
    string_list, text_cell, text_value,
};

const IN_APP_PURCHASES_SECTION: &str = "In-app purchases";

/// Normalizes raw source records into graph nodes plus the explicit
/// references between them.
///
/// Records without an identity are dropped, logged and counted; references
/// are not checked here, the resolver does that once every node is known.
pub fn build_graph(records: SourceRecords) -> GraphData {
    let mut graph = GraphData::new();
    graph.dropped_records += records.unreadable_rows;

    for record in records.repositories {
        map_repository(&mut graph, record);
    }

    for listing in records.listings {
        let package = listing.package.clone();
        match normalize_listing(listing) {
            Ok(page) => {
                graph.add_entity(page);
                add_app(&mut graph, &package);
            }
            Err(err) => {
                log::warn!("dropping play listing {package}: {err}");
                graph.record_malformed();
            }
        }
    }

    log::info!(
        "normalized {} nodes and {} references ({} records dropped)",
        graph.node_count(),
        graph.references.len(),
        graph.dropped_records
    );
    graph
}

/// Adds the `App` for a package together with its `PUBLISHED_AT` reference.
fn add_app(graph: &mut GraphData, package: &str) -> String {
    let app = App::for_package(package);
    let id = app.id.clone();
    if graph.add_entity(app) {
        graph.add_reference(GeneralRelation::new(
            RelationType::PublishedAt,
            NodeRef::new(NodeLabel::App, &id),
            NodeRef::new(NodeLabel::GooglePlayPage, package),
        ));
    }
    id
}

pub fn normalize_listing(listing: PlayListing) -> Result<GooglePlayPage> {
    let PlayListing {
        package,
        details,
        category,
        modified_at,
    } = listing;

    let details = match details {
        Some(details) => details,
        None if category.is_some() => json!({ "docId": package }),
        None => {
            return Err(FetchError::MalformedRecord(format!(
                "no details or category document for {package}"
            )))
        }
    };

    let doc_id = json_path(&details, &["docId"])
        .and_then(text_value)
        .filter(|id| !id.trim().is_empty())
        .ok_or(FetchError::MissingField("docId"))?;

    let text = |path: &[&str]| json_path(&details, path).and_then(text_value);
    let app_details = |key: &str| json_path(&details, &["details", "appDetails", key]);

    let mut app_category = app_details("appCategory").and_then(string_list);
    if let Some(extra) = category.and_then(|c| text_cell(c.app_category.as_deref())) {
        app_category.get_or_insert_with(Vec::new).push(extra);
    }

    Ok(GooglePlayPage {
        uri: text(&["shareUrl"]),
        snapshot_timestamp: modified_at,
        title: text(&["title"]),
        app_category,
        promotional_description: text(&["promotionalDescription"]),
        description_html: text(&["descriptionHtml"]),
        translated_description_html: text(&["translatedDescriptionHtml"]),
        version_code: app_details("versionCode").and_then(int_value),
        version_string: app_details("versionString").and_then(text_value),
        upload_date: app_details("uploadDate")
            .and_then(Value::as_str)
            .and_then(parse_upload_date),
        formatted_amount: text(&["offer", "0", "formattedAmount"]),
        currency_code: text(&["offer", "0", "currencyCode"]),
        in_app_purchases: in_app_purchases(&details),
        install_notes: app_details("installNotes").and_then(text_value),
        star_rating: json_path(&details, &["aggregateRating", "starRating"]).and_then(star_rating),
        num_downloads: app_details("numDownloads").and_then(text_value),
        developer_name: app_details("developerName").and_then(text_value),
        developer_email: app_details("developerEmail").and_then(text_value),
        developer_website: app_details("developerWebsite").and_then(text_value),
        target_sdk_version: app_details("targetSdkVersion").and_then(int_value),
        permissions: app_details("permission").and_then(string_list),
        doc_id,
    })
}

fn in_app_purchases(details: &Value) -> Option<String> {
    json_path(details, &["productDetails", "section"])?
        .as_array()?
        .iter()
        .find(|section| section.get("title").and_then(Value::as_str) == Some(IN_APP_PURCHASES_SECTION))
        .and_then(|section| json_path(section, &["description", "0", "description"]))
        .and_then(text_value)
}

pub fn normalize_repository(
    row: &RepositoryRow,
    snapshot: Option<&SnapshotRow>,
) -> Result<GitHubRepository> {
    let id = int_cell(row.id.as_deref()).ok_or(FetchError::MissingField("id"))?;
    let owner_type = text_cell(row.owner_type.as_deref()).and_then(|raw| {
        raw.parse::<OwnerType>()
            .map_err(|err| log::debug!("repository {id}: {err}"))
            .ok()
    });

    Ok(GitHubRepository {
        id,
        owner: text_cell(row.owner_login.as_deref()),
        name: text_cell(row.name.as_deref()),
        snapshot: snapshot.and_then(|s| text_cell(s.web_url.as_deref())),
        snapshot_timestamp: snapshot
            .and_then(|s| s.created_at.as_deref())
            .and_then(parse_iso8601),
        description: text_cell(row.description.as_deref()),
        created_at: row.created_at.as_deref().and_then(parse_iso8601),
        forks_count: int_cell(row.forks_count.as_deref()),
        stargazers_count: int_cell(row.stargazers_count.as_deref()),
        subscribers_count: int_cell(row.subscribers_count.as_deref()),
        watchers_count: int_cell(row.watchers_count.as_deref()),
        network_count: int_cell(row.network_count.as_deref()),
        owner_type,
        parent_id: int_cell(row.parent_id.as_deref()),
        source_id: int_cell(row.source_id.as_deref()),
    })
}

fn map_repository(graph: &mut GraphData, record: RepositoryRecord) {
    let RepositoryRecord { row, details } = record;
    let repository = match normalize_repository(&row, details.snapshot.as_ref()) {
        Ok(repository) => repository,
        Err(err) => {
            log::warn!(
                "dropping repository {}: {err}",
                row.full_name.as_deref().unwrap_or("<unnamed>")
            );
            graph.record_malformed();
            return;
        }
    };
    let repository_id = repository.id;
    graph.add_entity(repository);

    let packages = row.packages.as_deref().map(split_list).unwrap_or_default();
    if packages.is_empty() {
        log::warn!("repository {repository_id} lists no packages");
    }
    let app_ids: Vec<(String, String)> = packages
        .iter()
        .map(|package| (package.clone(), add_app(graph, package)))
        .collect();

    for commit in details.commits {
        if let Err(err) = map_commit(graph, repository_id, commit) {
            log::warn!("dropping commit of repository {repository_id}: {err}");
            graph.record_malformed();
        }
    }

    for branch in details.branches {
        let Some(name) = text_cell(branch.branch_name.as_deref()) else {
            log::warn!("dropping branch of repository {repository_id}: missing field: branch_name");
            graph.record_malformed();
            continue;
        };
        let branch_node = Branch::new(repository_id, &name);
        let from = NodeRef::new(NodeLabel::Branch, &branch_node.id);
        graph.add_entity(branch_node);
        add_anchors(graph, from, repository_id, branch.commit_hash.as_deref());
    }

    for tag in details.tags {
        let Some(name) = text_cell(tag.tag_name.as_deref()) else {
            log::warn!("dropping tag of repository {repository_id}: missing field: tag_name");
            graph.record_malformed();
            continue;
        };
        let tag_node = Tag::new(repository_id, &name, text_cell(tag.tag_message.as_deref()));
        let from = NodeRef::new(NodeLabel::Tag, &tag_node.id);
        graph.add_entity(tag_node);
        add_anchors(graph, from, repository_id, tag.commit_hash.as_deref());
    }

    for relation in implemented_relations(repository_id, &app_ids, &details.paths) {
        graph.add_reference(relation);
    }
}

/// `BELONGS_TO` the repository and, when a hash is given, `POINTS_TO` the commit.
fn add_anchors(graph: &mut GraphData, from: NodeRef, repository_id: i64, commit: Option<&str>) {
    graph.add_reference(GeneralRelation::new(
        RelationType::BelongsTo,
        from.clone(),
        NodeRef::repository(repository_id),
    ));
    if let Some(hash) = text_cell(commit) {
        graph.add_reference(GeneralRelation::new(
            RelationType::PointsTo,
            from,
            NodeRef::commit(hash),
        ));
    }
}

fn map_commit(graph: &mut GraphData, repository_id: i64, row: CommitRow) -> Result<()> {
    let id = text_cell(row.id.as_deref()).ok_or(FetchError::MissingField("id"))?;
    let authored_at = row.authored_date.as_deref().and_then(parse_iso8601);
    let committed_at = row.committed_date.as_deref().and_then(parse_iso8601);

    graph.add_entity(Commit {
        id: id.clone(),
        short_id: text_cell(row.short_id.as_deref()),
        title: text_cell(row.title.as_deref()),
        message: row.message.clone().filter(|m| !m.is_empty()),
        additions: int_cell(row.additions.as_deref()),
        deletions: int_cell(row.deletions.as_deref()),
        total: int_cell(row.total.as_deref()),
        authored_at,
        committed_at,
    });
    graph.add_reference(GeneralRelation::new(
        RelationType::BelongsTo,
        NodeRef::commit(&id),
        NodeRef::repository(repository_id),
    ));

    let people = [
        (
            RelationType::Authors,
            &row.author_email,
            &row.author_name,
            authored_at,
        ),
        (
            RelationType::Commits,
            &row.committer_email,
            &row.committer_name,
            committed_at,
        ),
    ];
    for (label, email, name, timestamp) in people {
        let Some(email) = text_cell(email.as_deref()) else {
            log::debug!("commit {id} has no {label} e-mail");
            continue;
        };
        graph.add_entity(Contributor {
            email: email.clone(),
            name: text_cell(name.as_deref()),
        });
        graph.add_reference(ContributeRelation {
            label,
            contributor: email,
            commit: id.clone(),
            timestamp,
        });
    }

    for parent in row.parent_ids.as_deref().map(split_list).unwrap_or_default() {
        graph.add_reference(GeneralRelation::new(
            RelationType::Parent,
            NodeRef::commit(&id),
            NodeRef::commit(parent),
        ));
    }
    Ok(())
}

/// One `IMPLEMENTED_BY` per package of the repository, carrying the manifest
/// and build file paths listed for it.
fn implemented_relations(
    repository_id: i64,
    apps: &[(String, String)],
    paths: &[PathRow],
) -> Vec<ImplementedRelation> {
    let mut by_package: HashMap<String, (Vec<String>, Vec<String>)> = HashMap::new();
    let mut path_order: Vec<String> = Vec::new();
    for row in paths {
        let Some(package) = text_cell(row.package.as_deref()) else {
            log::warn!("repository {repository_id}: path row without package");
            continue;
        };
        let entry = by_package.entry(package.clone()).or_insert_with(|| {
            path_order.push(package.clone());
            (Vec::new(), Vec::new())
        });
        entry.0.extend(text_cell(row.manifest_path.as_deref()));
        entry.1.extend(text_cell(row.build_path.as_deref()));
    }

    let indexed: BTreeSet<&str> = apps.iter().map(|(package, _)| package.as_str()).collect();
    let listed: BTreeSet<&str> = by_package.keys().map(String::as_str).collect();
    if indexed != listed {
        log::error!(
            "repository {repository_id}: packages with paths {listed:?} do not match indexed packages {indexed:?}"
        );
    }

    let mut relations: Vec<ImplementedRelation> = apps
        .iter()
        .map(|(package, app_id)| {
            let (manifest_paths, build_paths) = by_package.remove(package).unwrap_or_default();
            ImplementedRelation {
                app_id: app_id.clone(),
                repository_id,
                manifest_paths,
                build_paths,
            }
        })
        .collect();

    // packages that only appear in paths.csv still reference their app
    for package in path_order {
        if let Some((manifest_paths, build_paths)) = by_package.remove(&package) {
            relations.push(ImplementedRelation {
                app_id: App::for_package(&package).id,
                repository_id,
                manifest_paths,
                build_paths,
            });
        }
    }
    relations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BranchRow, CategoryRecord, RepositoryDetails, TagRow};
    use graphstore::schemas::Relation;

    fn cell(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn repository_row(id: &str, packages: &str) -> RepositoryRow {
        RepositoryRow {
            id: cell(id),
            full_name: cell("dev/notes"),
            owner_login: cell("dev"),
            name: cell("notes"),
            created_at: cell("2014-02-27T15:05:06+01:00"),
            forks_count: cell("3"),
            owner_type: cell("User"),
            parent_id: cell("-1"),
            source_id: cell("-1"),
            packages: cell(packages),
            ..RepositoryRow::default()
        }
    }

    fn labels(graph: &GraphData) -> Vec<RelationType> {
        graph.references.iter().map(Relation::label).collect()
    }

    #[test]
    fn listing_fields_follow_their_paths() {
        let listing = PlayListing {
            package: "org.example.notes".into(),
            details: Some(json!({
                "docId": "org.example.notes",
                "shareUrl": "https://play.google.com/store/apps/details?id=org.example.notes",
                "title": "Notes",
                "offer": [{"formattedAmount": "Free", "currencyCode": "USD"}],
                "aggregateRating": {"starRating": 4.5},
                "productDetails": {"section": [
                    {"title": "Other", "description": [{"description": "nope"}]},
                    {"title": "In-app purchases", "description": [{"description": "$0.99 per item"}]}
                ]},
                "details": {"appDetails": {
                    "appCategory": [" Productivity "],
                    "versionCode": 12,
                    "versionString": "1.2",
                    "uploadDate": "Mar 27, 2015",
                    "targetSdkVersion": "26",
                    "permission": []
                }}
            })),
            category: Some(CategoryRecord {
                app_category: Some(" Tools ".into()),
            }),
            modified_at: Some(1_500_000_000),
        };

        let page = normalize_listing(listing).unwrap();
        assert_eq!(page.doc_id, "org.example.notes");
        assert_eq!(page.snapshot_timestamp, Some(1_500_000_000));
        assert_eq!(
            page.app_category,
            Some(vec!["Productivity".to_string(), "Tools".to_string()])
        );
        assert_eq!(page.version_code, Some(12));
        assert_eq!(page.target_sdk_version, Some(26));
        assert_eq!(page.upload_date, Some(1427414400));
        assert_eq!(page.formatted_amount.as_deref(), Some("Free"));
        assert_eq!(page.in_app_purchases.as_deref(), Some("$0.99 per item"));
        assert_eq!(page.star_rating, Some(4.5));
        assert_eq!(page.permissions, Some(vec![]));
        assert_eq!(page.developer_name, None);
    }

    #[test]
    fn category_only_listing_uses_package_as_doc_id() {
        let page = normalize_listing(PlayListing {
            package: "org.example.cat".into(),
            details: None,
            category: Some(CategoryRecord {
                app_category: Some("Games".into()),
            }),
            modified_at: None,
        })
        .unwrap();
        assert_eq!(page.doc_id, "org.example.cat");
        assert_eq!(page.app_category, Some(vec!["Games".to_string()]));
        assert_eq!(page.title, None);
    }

    #[test]
    fn listing_without_doc_id_is_malformed() {
        let err = normalize_listing(PlayListing {
            package: "org.example.bad".into(),
            details: Some(json!({"title": "No id"})),
            ..PlayListing::default()
        })
        .unwrap_err();
        assert!(matches!(err, FetchError::MissingField("docId")));
    }

    #[test]
    fn repository_coercions() {
        let mut row = repository_row("7", "org.example.notes");
        row.owner_type = cell("Bot");
        row.stargazers_count = cell("many");
        let snapshot = SnapshotRow {
            web_url: cell("https://git.example.org/notes"),
            created_at: cell("2008-09-03T20:56:35.450686Z"),
        };

        let repo = normalize_repository(&row, Some(&snapshot)).unwrap();
        assert_eq!(repo.id, 7);
        assert_eq!(repo.owner.as_deref(), Some("dev"));
        assert_eq!(repo.created_at, Some(1393509906));
        assert_eq!(repo.snapshot_timestamp, Some(1220475395));
        assert_eq!(repo.forks_count, Some(3));
        assert_eq!(repo.stargazers_count, None);
        assert_eq!(repo.owner_type, None);
        assert_eq!(repo.parent_id, Some(-1));

        let missing = normalize_repository(&repository_row("", "x"), None).unwrap_err();
        assert!(matches!(missing, FetchError::MissingField("id")));
    }

    #[test]
    fn repository_details_become_nodes_and_references() {
        let records = SourceRecords {
            repositories: vec![RepositoryRecord {
                row: repository_row("1", "org.example.notes"),
                details: RepositoryDetails {
                    commits: vec![CommitRow {
                        id: cell("c2"),
                        title: cell("second"),
                        author_email: cell("a@example.org"),
                        author_name: cell("A"),
                        committer_email: cell("a@example.org"),
                        authored_date: cell("2014-02-27T15:05:06+01:00"),
                        parent_ids: cell("c1"),
                        ..CommitRow::default()
                    }],
                    branches: vec![
                        BranchRow {
                            branch_name: cell("main"),
                            commit_hash: cell("c2"),
                        },
                        BranchRow::default(),
                    ],
                    tags: vec![TagRow {
                        tag_name: cell("v1"),
                        tag_message: None,
                        commit_hash: cell("c2"),
                    }],
                    ..RepositoryDetails::default()
                },
            }],
            ..SourceRecords::default()
        };

        let graph = build_graph(records);
        assert_eq!(graph.repositories.len(), 1);
        assert_eq!(graph.commits.len(), 1);
        assert_eq!(graph.contributors.len(), 1);
        assert_eq!(graph.branches.len(), 1);
        assert_eq!(graph.tags.len(), 1);
        assert_eq!(graph.apps.len(), 1);
        // the unnamed branch
        assert_eq!(graph.dropped_records, 1);

        let labels = labels(&graph);
        let count = |label| labels.iter().filter(|l| **l == label).count();
        assert_eq!(count(RelationType::PublishedAt), 1);
        assert_eq!(count(RelationType::BelongsTo), 3);
        assert_eq!(count(RelationType::PointsTo), 2);
        assert_eq!(count(RelationType::Parent), 1);
        assert_eq!(count(RelationType::Authors), 1);
        assert_eq!(count(RelationType::Commits), 1);
        assert_eq!(count(RelationType::ImplementedBy), 1);
    }

    #[test]
    fn overflowing_repository_ids_are_dropped_not_merged() {
        let mut forked = repository_row("5", "org.example.notes");
        forked.parent_id = cell("9223372036854775808");
        forked.source_id = cell("1e30");
        let records = SourceRecords {
            repositories: [
                repository_row("9223372036854775808", "org.example.notes"),
                repository_row("99999999999999999999", "org.example.notes"),
                forked,
            ]
            .into_iter()
            .map(|row| RepositoryRecord {
                row,
                details: RepositoryDetails::default(),
            })
            .collect(),
            ..SourceRecords::default()
        };

        let graph = build_graph(records);
        assert_eq!(graph.dropped_records, 2);
        assert_eq!(graph.repositories.len(), 1);
        let repo = graph.repositories.get("5").unwrap();
        assert_eq!(repo.parent_id, None);
        assert_eq!(repo.source_id, None);
        assert!(!graph.repositories.contains(&i64::MAX.to_string()));
    }

    #[test]
    fn author_and_committer_get_their_own_edges() {
        let records = SourceRecords {
            repositories: vec![RepositoryRecord {
                row: repository_row("1", "org.example.notes"),
                details: RepositoryDetails {
                    commits: vec![CommitRow {
                        id: cell("c9"),
                        author_email: cell("author@example.org"),
                        author_name: cell("Author"),
                        authored_date: cell("2014-02-27T15:05:06+01:00"),
                        committer_email: cell("committer@example.org"),
                        committer_name: cell("Committer"),
                        committed_date: cell("2015-03-27T19:25:23.000-08:00"),
                        ..CommitRow::default()
                    }],
                    ..RepositoryDetails::default()
                },
            }],
            ..SourceRecords::default()
        };

        let graph = build_graph(records);
        assert_eq!(graph.contributors.len(), 2);
        assert_eq!(
            graph.contributors.get("author@example.org").unwrap().name.as_deref(),
            Some("Author")
        );
        assert_eq!(
            graph.contributors.get("committer@example.org").unwrap().name.as_deref(),
            Some("Committer")
        );

        let contributions: Vec<&ContributeRelation> = graph
            .references
            .iter()
            .filter_map(|relation| match relation {
                Relation::Contribute(contribution) => Some(contribution),
                _ => None,
            })
            .collect();
        assert_eq!(
            contributions,
            vec![
                &ContributeRelation {
                    label: RelationType::Authors,
                    contributor: "author@example.org".into(),
                    commit: "c9".into(),
                    timestamp: Some(1393509906),
                },
                &ContributeRelation {
                    label: RelationType::Commits,
                    contributor: "committer@example.org".into(),
                    commit: "c9".into(),
                    timestamp: Some(1427513123),
                },
            ]
        );
    }

    #[test]
    fn mismatched_paths_still_connect_every_package() {
        let apps = vec![
            ("org.a".to_string(), App::for_package("org.a").id),
            ("org.b".to_string(), App::for_package("org.b").id),
        ];
        let paths = vec![
            PathRow {
                package: cell("org.a"),
                manifest_path: cell("a/AndroidManifest.xml"),
                build_path: cell("a/build.gradle"),
            },
            PathRow {
                package: cell("org.c"),
                manifest_path: cell("c/AndroidManifest.xml"),
                build_path: None,
            },
        ];

        let relations = implemented_relations(9, &apps, &paths);
        assert_eq!(relations.len(), 3);
        assert_eq!(relations[0].manifest_paths, vec!["a/AndroidManifest.xml"]);
        assert_eq!(relations[1].app_id, App::for_package("org.b").id);
        assert!(relations[1].manifest_paths.is_empty());
        assert_eq!(relations[2].app_id, App::for_package("org.c").id);
        assert!(relations[2].build_paths.is_empty());
    }

    #[test]
    fn unreadable_rows_count_as_dropped() {
        let graph = build_graph(SourceRecords {
            unreadable_rows: 2,
            ..SourceRecords::default()
        });
        assert_eq!(graph.dropped_records, 2);
    }
}
