//! Template path cache: scan conventions, pure lookups, layout precedence
//! and reload visibility.

use turnstile::TemplateResolver;

mod common;
use common::write_template;

#[test]
fn test_resolves_action_templates_by_convention() {
    let views = common::view_tree();
    let resolver = TemplateResolver::build(views.path()).unwrap();

    let path = resolver.resolve_action("widgets", "index", "html").unwrap();
    assert!(path.ends_with("widgets/index.html.j2"));

    let path = resolver.resolve_action("widgets", "index", "xml").unwrap();
    assert!(path.ends_with("widgets/index.xml.j2"));
}

#[test]
fn test_miss_records_the_attempted_glob() {
    let views = common::view_tree();
    let resolver = TemplateResolver::build(views.path()).unwrap();

    let miss = resolver.resolve_action("widgets", "index", "json").unwrap_err();
    assert_eq!(miss.globs.len(), 1);
    assert!(miss.globs[0].ends_with("widgets/index.json.*"));
    assert!(miss.to_string().contains("no template matched at"));
}

#[test]
fn test_files_without_two_suffix_components_are_ignored() {
    let views = common::view_tree();
    let root = views.path();
    write_template(root, "widgets/readme.txt", "not a template");
    write_template(root, "widgets/edit.html.extra.j2", "too many parts");
    let resolver = TemplateResolver::build(root).unwrap();

    assert!(resolver.resolve("widgets/readme", "txt").is_err());
    assert!(resolver.resolve_action("widgets", "edit", "html").is_err());
    assert!(resolver.resolve_action("widgets", "edit.html", "extra").is_err());
}

#[test]
fn test_changes_are_invisible_until_reload() {
    let views = common::view_tree();
    let root = views.path();
    let resolver = TemplateResolver::build(root).unwrap();
    let before = resolver.entry_count();

    write_template(root, "widgets/edit.html.j2", "edit form");
    assert!(resolver.resolve_action("widgets", "edit", "html").is_err());
    assert_eq!(resolver.entry_count(), before);

    resolver.reload().unwrap();
    assert_eq!(resolver.entry_count(), before + 1);
    let path = resolver.resolve_action("widgets", "edit", "html").unwrap();
    assert!(path.ends_with("widgets/edit.html.j2"));
}

#[test]
fn test_removed_templates_disappear_after_reload() {
    let views = common::view_tree();
    let root = views.path();
    let resolver = TemplateResolver::build(root).unwrap();
    assert!(resolver.resolve_action("widgets", "show", "html").is_ok());

    std::fs::remove_file(root.join("widgets/show.html.j2")).unwrap();
    assert!(resolver.resolve_action("widgets", "show", "html").is_ok());

    resolver.reload().unwrap();
    assert!(resolver.resolve_action("widgets", "show", "html").is_err());
}

#[test]
fn test_layout_precedence_controller_layout_first() {
    let views = common::view_tree();
    let root = views.path();
    write_template(root, "layout/widgets.html.j2", "widgets layout");
    write_template(root, "layout/custom.html.j2", "custom layout");
    let resolver = TemplateResolver::build(root).unwrap();

    // Controller-named layout shadows even an explicit request.
    let path = resolver
        .resolve_layout("widgets", Some("custom"), "application", "html")
        .unwrap();
    assert!(path.ends_with("layout/widgets.html.j2"));

    // No controller layout: the requested name wins.
    let path = resolver
        .resolve_layout("gears", Some("custom"), "application", "html")
        .unwrap();
    assert!(path.ends_with("layout/custom.html.j2"));

    // Neither: the default layout.
    let path = resolver
        .resolve_layout("gears", None, "application", "html")
        .unwrap();
    assert!(path.ends_with("layout/application.html.j2"));
}

#[test]
fn test_layout_miss_collects_every_attempted_glob() {
    let views = common::view_tree();
    let resolver = TemplateResolver::build(views.path()).unwrap();
    let miss = resolver
        .resolve_layout("gears", Some("custom"), "application", "xml")
        .unwrap_err();
    assert_eq!(miss.globs.len(), 3);
    assert!(miss.globs[0].contains("layout/gears.xml"));
    assert!(miss.globs[1].contains("layout/custom.xml"));
    assert!(miss.globs[2].contains("layout/application.xml"));
}

#[test]
fn test_partial_resolution() {
    let views = common::view_tree();
    let resolver = TemplateResolver::build(views.path()).unwrap();

    let path = resolver.resolve_partial("widgets", "row", "html").unwrap();
    assert!(path.ends_with("widgets/_row.html.j2"));

    let path = resolver.resolve_partial("widgets", "shared/note", "html").unwrap();
    assert!(path.ends_with("shared/_note.html.j2"));

    assert!(resolver.resolve_partial("widgets", "missing", "html").is_err());
}
