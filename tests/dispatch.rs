//! End-to-end dispatch through the axum router.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use mvc_router::auth::HeaderAuth;
use mvc_router::config::{MappingConfig, MappingEntry};
use mvc_router::error::ModuleError;
use mvc_router::mvc::{
    ActionOutput, BundleExport, BundleModule, BundleObject, ControllerHandle, FnController, ModuleRoot, Registry,
    ViewModel,
};
use mvc_router::{App, AppConfig, HttpServer, RouteError};

mod common;

use common::{echo_controller, get_json, send, server};

#[tokio::test]
async fn test_nested_controller_with_positional_args() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(
        ModuleRoot::App,
        "blog/PostController",
        ControllerHandle::new(|| echo_controller(&["show"])),
    );
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/blog/post/show/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["controller"], "Post");
    assert_eq!(body["data"]["action"], "show");
    assert_eq!(body["data"]["args"], json!(["42"]));
}

#[tokio::test]
async fn test_defaults_fill_missing_segments() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "IndexController", ControllerHandle::new(|| echo_controller(&["index"])));
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["controller"], "Index");
    assert_eq!(body["data"]["args"], json!([]));
}

#[tokio::test]
async fn test_underscore_action_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(
        ModuleRoot::App,
        "IndexController",
        ControllerHandle::new(|| echo_controller(&["index", "_secret"])),
    );
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/index/_secret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "_secret is not valid action method.");
}

#[tokio::test]
async fn test_underscore_action_is_rejected_even_when_undefined() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "IndexController", ControllerHandle::new(|| echo_controller(&["index"])));
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/index/_hidden").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "_hidden is not valid action method.");
}

#[tokio::test]
async fn test_missing_action_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "IndexController", ControllerHandle::new(|| echo_controller(&["index"])));
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/index/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["msg"],
        "[404 Exception] Action method IndexController.missing() is not found."
    );
}

#[tokio::test]
async fn test_unknown_url_is_404_after_all_prefixes() {
    let dir = tempfile::tempdir().unwrap();
    let router = server(dir.path(), Registry::new(), |_| {}).router();

    let (status, body) = get_json(&router, "/nothing/here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_unresolved_urls_leave_bundle_registry_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::builder(AppConfig::with_base_dir(dir.path()))
        .registry(Registry::new())
        .build()
        .unwrap();
    let router = HttpServer::new(app.clone()).unwrap().router();

    for i in 0..50 {
        let (status, _) = get_json(&router, &format!("/scan{}/x", i)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert!(app.bundles().is_empty());
}

#[tokio::test]
async fn test_param_seq_binding() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "PostController", ControllerHandle::new(|| echo_controller(&["show"])));
    let router = server(dir.path(), registry, |config| {
        config.router.urls_mapping.insert(
            "/p/:id/:slug".into(),
            MappingEntry::Detailed(MappingConfig {
                target: Some("post/show".into()),
                param_seq: Some(vec![Some("slug".into()), Some("id".into())]),
                ..Default::default()
            }),
        );
    })
    .router();

    let (status, body) = get_json(&router, "/p/7/hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["args"], json!(["hello", "7"]));
}

#[tokio::test]
async fn test_target_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "PostController", ControllerHandle::new(|| echo_controller(&["show"])));
    let router = server(dir.path(), registry, |config| {
        config
            .router
            .urls_mapping
            .insert("/posts/:id".into(), MappingEntry::Target("post/show/${id}".into()));
    })
    .router();

    let (status, body) = get_json(&router, "/posts/9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "show");
    assert_eq!(body["data"]["args"], json!(["9"]));
}

#[tokio::test]
async fn test_url_prefix_selects_search_dir() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "admin/UserController", ControllerHandle::new(|| echo_controller(&["show"])));
    let router = server(dir.path(), registry, |config| {
        config.router.urls_prefix = vec!["/admin/".into()];
    })
    .router();

    let (status, body) = get_json(&router, "/admin/user/show/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["controller"], "User");
    assert_eq!(body["data"]["args"], json!(["5"]));
}

#[tokio::test]
async fn test_auto_url_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(
        ModuleRoot::App,
        "admin/v1/UserController",
        ControllerHandle::new(|| echo_controller(&["list"])),
    );
    let router = server(dir.path(), registry, |config| {
        config.router.auto_url_prefix = true;
    })
    .router();

    let (status, body) = get_json(&router, "/admin_v1_user/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["controller"], "User");
    assert_eq!(body["data"]["action"], "list");
}

#[tokio::test]
async fn test_broken_controller_is_500_without_bundle_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "BlogController", ControllerHandle::broken("BlogController", "bad syntax"));
    let app = App::builder(AppConfig::with_base_dir(dir.path()))
        .registry(registry)
        .build()
        .unwrap();
    let router = HttpServer::new(app.clone()).unwrap().router();

    let (status, body) = get_json(&router, "/blog/index").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert!(app.bundles().names().is_empty());
}

#[tokio::test]
async fn test_in_tree_bundle_resolution_and_core_merge() {
    let dir = tempfile::tempdir().unwrap();
    let bundle_dir = dir.path().join("bundles/shop");
    fs::create_dir_all(bundle_dir.join("config")).unwrap();
    fs::write(
        bundle_dir.join("config/config.toml"),
        "[default]\ncontrollerName = \"cart\"\n[core.\"db.pool\"]\nsize = 4\ntimeout = 30\n",
    )
    .unwrap();

    let registry = Registry::new();
    registry.register_bundle(BundleModule::in_tree(
        "shop",
        BundleExport::Object(
            BundleObject::new().controller("CartController", ControllerHandle::new(|| echo_controller(&["index", "add"]))),
        ),
    ));
    let app = App::builder(AppConfig::with_base_dir(dir.path()))
        .registry(registry)
        .host_config(json!({"db": {"pool": {"timeout": 10}}}))
        .build()
        .unwrap();
    let router = HttpServer::new(app.clone()).unwrap().router();

    let (status, body) = get_json(&router, "/shop/cart/add/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bundle"], "shop");
    assert_eq!(body["data"]["action"], "add");
    assert_eq!(body["data"]["args"], json!(["3"]));

    let (status, body) = get_json(&router, "/shop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["controller"], "Cart");

    assert_eq!(app.host_config()["db"]["pool"], json!({"timeout": 10, "size": 4}));
}

#[tokio::test]
async fn test_named_bundle_loads_once() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registry = Registry::new();
    registry.register_bundle(BundleModule::factory("bootjs-bundle-blog", move |_app| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(BundleObject::new()
            .with_base_dir("/srv/vendor/blog/src")
            .controller("PostController", ControllerHandle::new(|| echo_controller(&["list"]))))
    }));
    let router = server(dir.path(), registry, |_| {}).router();

    let (a, b) = tokio::join!(get_json(&router, "/blog/post/list"), get_json(&router, "/blog/post/list"));
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    let (status, _) = get_json(&router, "/blog/post/list/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_broken_bundle_stops_prefix_search() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registry = Registry::new();
    registry.register_bundle(BundleModule::factory("bootjs-bundle-shop", move |_app| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ModuleError::Broken {
            module: "bootjs-bundle-shop".into(),
            reason: "unexpected token".into(),
        })
    }));
    registry.register_bundle(BundleModule::object(
        "shop",
        BundleObject::new()
            .with_base_dir("/srv/vendor/shop/src")
            .controller("CartController", ControllerHandle::new(|| echo_controller(&["index"]))),
    ));
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body) = get_json(&router, "/shop/cart").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_prefix_falls_through_to_next_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_bundle(BundleModule::object(
        "shop",
        BundleObject::new()
            .with_base_dir("/srv/vendor/shop/src")
            .controller("CartController", ControllerHandle::new(|| echo_controller(&["index"]))),
    ));
    let app = App::builder(AppConfig::with_base_dir(dir.path()))
        .registry(registry)
        .build()
        .unwrap();
    let router = HttpServer::new(app.clone()).unwrap().router();

    let (status, body) = get_json(&router, "/shop/cart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bundle"], "shop");
    assert_eq!(body["data"]["controller"], "Cart");
    assert_eq!(app.bundles().names(), vec!["shop"]);

    let (status, body) = get_json(&router, "/outlet/cart").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert_eq!(app.bundles().names(), vec!["shop"]);
}

#[tokio::test]
async fn test_auth_gate() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry.register_controller(ModuleRoot::App, "AccountController", ControllerHandle::new(|| echo_controller(&["index"])));
    let mut config = AppConfig::with_base_dir(dir.path());
    config.router.urls_mapping.insert(
        "/account".into(),
        MappingEntry::Detailed(MappingConfig {
            target: Some("account/index".into()),
            auth: Some(mvc_router::config::AuthSetting::Flag(true)),
            ..Default::default()
        }),
    );
    let app = App::builder(config)
        .registry(registry)
        .auth("bootjs-auth", Arc::new(HeaderAuth::new("x-user", "/sso/login")))
        .build()
        .unwrap();
    let router = HttpServer::new(app).unwrap().router();

    let (status, body, _) = send(&router, "GET", "/account").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<script>window.location = \"/sso/login\";</script>");

    let request = axum::http::Request::get("/account")
        .header("x-user", "ann")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body, _) = common::send_request(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["controller"], "Account");
}

#[tokio::test]
async fn test_view_rendering_and_request_id() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("views/page")).unwrap();
    fs::write(dir.path().join("views/page/about.html"), "<h1>{{title}}</h1>").unwrap();

    let registry = Registry::new();
    registry.register_controller(
        ModuleRoot::App,
        "PageController",
        ControllerHandle::new(|| {
            FnController::new().action("about", |_cx, _args| async {
                Ok::<_, RouteError>(ActionOutput::View(ViewModel::new(json!({"title": "About us"}))))
            })
        }),
    );
    let router = server(dir.path(), registry, |_| {}).router();

    let (status, body, request_id) = send(&router, "GET", "/page/about").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>About us</h1>");
    assert!(request_id.is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_exception_handler_disabled_uses_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let router = server(dir.path(), Registry::new(), |config| {
        config.exception.enabled = false;
    })
    .router();

    let (status, body, _) = send(&router, "GET", "/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("ghost"));
    assert!(serde_json::from_str::<serde_json::Value>(&body).is_err());
}
