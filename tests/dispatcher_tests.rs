//! The per-request dispatch lifecycle end to end: routing checks, parameter
//! binding, hidden actions, rendering, session hooks and response assembly.

use std::sync::Arc;
use turnstile::{
    Body, ControllerSpec, MemorySessionStore, ParamSpec, RenderOptions, SessionStore,
};

mod common;
use tracing_util::TestTracing;

fn widgets_spec() -> Arc<ControllerSpec> {
    ControllerSpec::builder("widgets")
        .provides(&["xml"])
        .action("index", |c, _args| {
            c.assign("widgets", vec!["anvil", "sprocket"])?;
            c.render(RenderOptions::default())
        })
        .action_with_params("show", &[ParamSpec::required("id")], |c, args| {
            Ok(Body::Literal(format!("showing widget {}", args[0])))
        })
        .action_with_params(
            "list",
            &[ParamSpec::optional("page", "1")],
            |_c, args| Ok(Body::Literal(format!("page {}", args[0]))),
        )
        .action("helper", |_c, _args| Ok(Body::Literal("internal".to_string())))
        .hide_action("helper")
        .build()
        .unwrap()
}

#[test]
fn test_index_renders_template_with_layout() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, action) = dispatcher.handle(common::routed("widgets", "index", &[]));
    assert_eq!(action, "index");
    assert_eq!(controller.status(), 200);
    assert_eq!(
        controller.body().as_str(),
        Some("<main><ul><li>anvil</li><li>sprocket</li></ul></main>")
    );
    assert_eq!(
        controller.get_header("Content-Type"),
        Some("text/html")
    );
}

#[test]
fn test_xml_accept_header_switches_template_and_content_type() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let request = common::routed_accepting("widgets", "index", "application/xml", &[]);
    let (controller, _action) = dispatcher.handle(request);
    assert_eq!(controller.status(), 200);
    assert_eq!(controller.body().as_str(), Some("<main><widgets>2</widgets></main>"));
    assert_eq!(controller.get_header("Content-Type"), Some("application/xml"));
    assert_eq!(controller.get_header("Encoding"), Some("UTF-8"));
}

#[test]
fn test_declared_params_are_bound_from_route_params() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, _) =
        dispatcher.handle(common::routed("widgets", "show", &[("id", "7")]));
    assert_eq!(controller.body().as_str(), Some("showing widget 7"));
}

#[test]
fn test_declared_params_fall_back_to_query_params() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let mut request = common::routed("widgets", "show", &[]);
    request
        .query_params
        .push((Arc::from("id"), "42".to_string()));
    let (controller, _) = dispatcher.handle(request);
    assert_eq!(controller.body().as_str(), Some("showing widget 42"));
}

#[test]
fn test_missing_required_param_is_bad_request() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, action) = dispatcher.handle(common::routed("widgets", "show", &[]));
    assert_eq!(controller.status(), 400);
    assert_eq!(action, "bad_request");
}

#[test]
fn test_optional_param_uses_declared_default() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, _) = dispatcher.handle(common::routed("widgets", "list", &[]));
    assert_eq!(controller.body().as_str(), Some("page 1"));

    let (controller, _) =
        dispatcher.handle(common::routed("widgets", "list", &[("page", "3")]));
    assert_eq!(controller.body().as_str(), Some("page 3"));
}

#[test]
fn test_hidden_action_is_action_not_found() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, action) = dispatcher.handle(common::routed("widgets", "helper", &[]));
    assert_eq!(controller.status(), 404);
    assert_eq!(action, "action_not_found");
}

#[test]
fn test_unknown_action_is_action_not_found() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let (controller, action) = dispatcher.handle(common::routed("widgets", "vanish", &[]));
    assert_eq!(controller.status(), 404);
    assert_eq!(action, "action_not_found");
}

#[test]
fn test_session_round_trips_through_the_store() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    let store = Arc::new(MemorySessionStore::new());
    dispatcher.set_session_store(Arc::clone(&store) as Arc<dyn SessionStore>);

    let spec = ControllerSpec::builder("counter")
        .action("bump", |c, _args| {
            let hits: u32 = c
                .session()
                .get("hits")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            c.session_mut()
                .insert("hits".to_string(), (hits + 1).to_string());
            Ok(Body::Literal(format!("hits={}", hits + 1)))
        })
        .build()
        .unwrap();
    dispatcher.register_controller(spec);

    let with_cookie = || {
        let mut request = common::routed("counter", "bump", &[]);
        request
            .cookies
            .push((Arc::from("_session_id"), "abc123".to_string()));
        request
    };

    let (controller, _) = dispatcher.handle(with_cookie());
    assert_eq!(controller.body().as_str(), Some("hits=1"));
    let (controller, _) = dispatcher.handle(with_cookie());
    assert_eq!(controller.body().as_str(), Some("hits=2"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_mutex_mode_still_dispatches() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.set_use_mutex(true);
    dispatcher.register_controller(widgets_spec());

    let (controller, _) =
        dispatcher.handle(common::routed("widgets", "show", &[("id", "1")]));
    assert_eq!(controller.status(), 200);
}

#[test]
fn test_respond_assembles_the_outbound_response() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let response = dispatcher.respond(common::routed("widgets", "show", &[("id", "9")]));
    assert_eq!(response.status, 200);
    assert_eq!(response.get_header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.body.into_bytes(), b"showing widget 9");
}

#[test]
fn test_controller_replacement_warns_and_replaces() {
    let _tracing = TestTracing::init();
    let views = common::view_tree();
    let mut dispatcher = common::dispatcher_for(views.path());
    dispatcher.register_controller(widgets_spec());

    let replacement = ControllerSpec::builder("widgets")
        .action("index", |_c, _args| Ok(Body::Literal("v2".to_string())))
        .build()
        .unwrap();
    dispatcher.register_controller(replacement);

    let (controller, _) = dispatcher.handle(common::routed("widgets", "index", &[]));
    assert_eq!(controller.body().as_str(), Some("v2"));
}
