//! The render surface: options, object transforms, partials, inline
//! rendering and layout exemptions.

use std::sync::Arc;
use serde::Serialize;
use serde_json::json;
use turnstile::{Body, Controller, ControllerSpec, DispatchEnv, RenderOptions, TemplateResolver};

mod common;

fn controller_for(views: &std::path::Path, accept: &str, formats: &[&str]) -> Controller {
    let resolver = Arc::new(TemplateResolver::build(views).unwrap());
    let env = Arc::new(DispatchEnv::with_defaults(resolver));
    let mut builder = ControllerSpec::builder("widgets")
        .action("index", |_c, _args| Ok(Body::Empty));
    if !formats.is_empty() {
        builder = builder.only_provides(formats);
    }
    let spec = builder.build().unwrap();
    let request = common::routed_accepting("widgets", "index", accept, &[]);
    Controller::build(spec, env, request, 200)
}

#[test]
fn test_render_action_option_selects_the_template() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.request_mut().set_param("id", "12");
    let body = controller.render(RenderOptions::action("show")).unwrap();
    assert_eq!(body.as_str(), Some("<main>widget 12</main>"));
}

#[test]
fn test_render_without_layout() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.request_mut().set_param("id", "12");
    let body = controller
        .render(RenderOptions::action("show").without_layout())
        .unwrap();
    assert_eq!(body.as_str(), Some("widget 12"));
}

#[test]
fn test_render_explicit_template_path() {
    let views = common::view_tree();
    common::write_template(views.path(), "shared/message.html.j2", "shared says {{ word }}");
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.assign("word", "hello").unwrap();
    let body = controller
        .render(RenderOptions::template("shared/message").without_layout())
        .unwrap();
    assert_eq!(body.as_str(), Some("shared says hello"));
}

#[test]
fn test_render_nothing_sets_status_and_space_body() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    let body = controller.render(RenderOptions::nothing(201)).unwrap();
    assert_eq!(controller.status(), 201);
    assert_eq!(body.as_str(), Some(" "));
}

#[test]
fn test_render_inline_through_the_default_engine() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.assign("name", "inline widget").unwrap();
    let body = controller
        .render(RenderOptions::inline("hi {{ name }}").without_layout())
        .unwrap();
    assert_eq!(body.as_str(), Some("hi inline widget"));
}

#[test]
fn test_render_inline_wraps_in_layout_by_default() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    let body = controller.render(RenderOptions::inline("inner")).unwrap();
    assert_eq!(body.as_str(), Some("<main>inner</main>"));
}

#[test]
fn test_js_format_is_exempt_from_layout() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/javascript", &["js"]);
    controller.request_mut().set_param("id", "3");
    let body = controller.render(RenderOptions::action("refresh")).unwrap();
    assert_eq!(body.as_str(), Some("reload(3);"));
}

#[test]
fn test_missing_template_surfaces_the_glob() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    let err = controller
        .render(RenderOptions::action("vanished"))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("no template matched at"));
    assert!(message.contains("widgets/vanished.html.*"));
}

#[derive(Serialize)]
struct Widget {
    name: &'static str,
    teeth: u32,
}

#[test]
fn test_render_object_prefers_an_existing_template() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.assign("widgets", vec!["anvil"]).unwrap();
    let body = controller
        .render_object(&Widget { name: "anvil", teeth: 9 }, RenderOptions::default())
        .unwrap();
    assert_eq!(body.as_str(), Some("<main><ul><li>anvil</li></ul></main>"));
}

#[test]
fn test_render_object_falls_back_to_the_format_transform() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "application/json", &["json"]);
    let body = controller
        .render_object(&Widget { name: "anvil", teeth: 9 }, RenderOptions::default())
        .unwrap();
    assert_eq!(body.as_str(), Some(r#"{"name":"anvil","teeth":9}"#));
    assert_eq!(controller.get_header("Content-Type"), Some("application/json"));
}

#[test]
fn test_partial_renders_with_locals() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    let out = controller
        .partial_collection("row", &[json!("anvil"), json!("sprocket")], None)
        .unwrap();
    assert_eq!(out, "<li>anvil#0</li><li>sprocket#1</li>");
}

#[test]
fn test_partial_from_another_view_directory() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &[]);
    let out = controller
        .partial_collection("shared/note", &[json!("remember")], Some("note"))
        .unwrap();
    assert_eq!(out, "note: remember");
}

#[test]
fn test_thrown_content_is_visible_to_later_renders() {
    let views = common::view_tree();
    common::write_template(
        views.path(),
        "widgets/summary.html.j2",
        "sidebar: {{ content.sidebar }}",
    );
    let mut controller = controller_for(views.path(), "text/html", &[]);
    controller.throw_content("sidebar", "three alerts");
    assert_eq!(controller.catch_content("sidebar"), "three alerts");
    let body = controller
        .render(RenderOptions::action("summary").without_layout())
        .unwrap();
    assert_eq!(body.as_str(), Some("sidebar: three alerts"));
}

#[test]
fn test_format_override_changes_template_lookup() {
    let views = common::view_tree();
    let mut controller = controller_for(views.path(), "text/html", &["html", "xml"]);
    controller.assign("widgets", vec!["a", "b", "c"]).unwrap();
    let body = controller
        .render(RenderOptions::default().with_format("xml"))
        .unwrap();
    assert_eq!(body.as_str(), Some("<main><widgets>3</widgets></main>"));
    assert_eq!(controller.get_header("Content-Type"), Some("application/xml"));
}
