//! Shared fixtures for the integration suites: a temp view tree with
//! representative templates and helpers for building routed requests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use turnstile::{DispatchEnv, Dispatcher, ParamVec, Request, TemplateResolver};

/// Write a template file under the view root, creating directories as
/// needed.
pub fn write_template(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A view tree with layouts, action templates, partials and an error page.
pub fn view_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_template(
        root,
        "layout/application.html.j2",
        "<main>{{ content.layout }}</main>",
    );
    write_template(
        root,
        "layout/application.xml.j2",
        "<main>{{ content.layout }}</main>",
    );
    write_template(
        root,
        "widgets/index.html.j2",
        "<ul>{% for w in widgets %}<li>{{ w }}</li>{% endfor %}</ul>",
    );
    write_template(root, "widgets/show.html.j2", "widget {{ params.id }}");
    write_template(
        root,
        "widgets/index.xml.j2",
        "<widgets>{{ widgets | length }}</widgets>",
    );
    write_template(root, "widgets/refresh.js.j2", "reload({{ params.id }});");
    write_template(root, "widgets/_row.html.j2", "<li>{{ row }}#{{ count }}</li>");
    write_template(root, "shared/_note.html.j2", "note: {{ note }}");
    write_template(
        root,
        "exceptions/not_found.html.j2",
        "custom missing page: {{ exception.detail }}",
    );
    dir
}

/// A dispatcher over the given view root with default engines and media
/// types.
pub fn dispatcher_for(root: &Path) -> Dispatcher {
    let resolver = Arc::new(TemplateResolver::build(root).unwrap());
    Dispatcher::new(Arc::new(DispatchEnv::with_defaults(resolver)))
}

/// A GET request the router has resolved to `{controller, action}` plus any
/// extra route params.
pub fn routed(controller: &str, action: &str, extra: &[(&str, &str)]) -> Request {
    let mut request = Request::new(http::Method::GET, format!("/{controller}/{action}"));
    let mut params = ParamVec::new();
    params.push((Arc::from("controller"), controller.to_string()));
    params.push((Arc::from("action"), action.to_string()));
    for (name, value) in extra {
        params.push((Arc::from(*name), (*value).to_string()));
    }
    request.apply_route(params);
    request
}

/// `routed` plus an Accept header.
pub fn routed_accepting(
    controller: &str,
    action: &str,
    accept: &str,
    extra: &[(&str, &str)],
) -> Request {
    let mut request = routed(controller, action, extra);
    request
        .headers
        .push((Arc::from("Accept"), accept.to_string()));
    request
}
