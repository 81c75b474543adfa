use super::*;
use std::fs;
use tempfile::tempdir;
use zintel::kernel::services::adapters::search::search_tree;
use zintel::kernel::services::adapters::Searcher;
use zintel::kernel::task::CancelToken;

fn options(include: Option<&str>, exclude: Option<&str>) -> SearchOptions {
    SearchOptions {
        regex: false,
        case_sensitive: false,
        whole_word: false,
        include: include.map(str::to_string),
        exclude: exclude.map(str::to_string),
    }
}

#[test]
fn test_comma_separated_filters_split_into_globs() {
    let filter = options(Some("*.py,*.txt"), Some("build, vendor")).filter(&Settings::default());
    assert_eq!(filter.include, vec!["*.py".to_string(), "*.txt".to_string()]);
    assert_eq!(filter.exclude_dirs, vec!["build".to_string(), "vendor".to_string()]);
}

#[test]
fn test_comma_separated_filters_drive_tree_search() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "needle\n").unwrap();
    fs::write(dir.path().join("b.txt"), "needle\n").unwrap();
    fs::write(dir.path().join("c.md"), "needle\n").unwrap();
    fs::create_dir(dir.path().join("build")).unwrap();
    fs::write(dir.path().join("build").join("d.py"), "needle\n").unwrap();

    let options = options(Some("*.py,*.txt"), Some("build,vendor"));
    let searcher = Searcher::new(&options.query("needle"), &Settings::default().search).unwrap();
    let outcome = search_tree(
        &LocalFileSystem::new(),
        dir.path(),
        &searcher,
        &options.filter(&Settings::default()),
        &CancelToken::new(),
        |_, _| {},
    )
    .unwrap();

    let mut found: Vec<_> = outcome.tree.files().iter().map(|f| f.path.clone()).collect();
    found.sort();
    assert_eq!(found, vec![dir.path().join("a.py"), dir.path().join("b.txt")]);
}

#[test]
fn test_blank_exclude_clears_skipped_dirs() {
    let filter = options(None, Some(" ")).filter(&Settings::default());
    assert!(filter.exclude_dirs.is_empty());
}

#[test]
fn test_preview_template_follows_regex_flag() {
    let literal = options(None, None);
    let template = ReplaceTemplate::for_query(&literal.query("PRICE"), "$5");
    assert!(!template.has_references());

    let regex = SearchOptions {
        regex: true,
        ..options(None, None)
    };
    let template = ReplaceTemplate::for_query(&regex.query("(P)RICE"), "$1");
    assert!(template.has_references());
}
