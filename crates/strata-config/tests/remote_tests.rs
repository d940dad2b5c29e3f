//! Config-server loading against an in-process mock server.

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use strata_config::{Config, ConfigServerClient, StrataError};

    /// Serve `doc` at `/app/profile/label` and return the base URL.
    async fn serve(doc: Value) -> String {
        let app = Router::new().route(
            "/app/profile/label",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn raw_yaml_doc() -> Value {
        json!({
            "name": "app",
            "profiles": ["profile"],
            "label": "label",
            "version": "12345",
            "propertySources": [{
                "name": "config name",
                "source": {
                    "profile": "profile",
                    "raw": "\na:\n  b: 123\n  c: abc\n  d:\n    - 1\n    - 2\n  e: true"
                }
            }]
        })
    }

    // ── Raw YAML ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_raw_yaml() {
        let url = serve(raw_yaml_doc()).await;
        let cfg = Config::new();
        cfg.load_from_config_server_with_raw_yaml(&url, "app", "profile", "label", "raw")
            .await
            .unwrap();

        assert_eq!(cfg.get_int("a.b"), 123);
        assert_eq!(cfg.get_string("a.c"), "abc");
        assert_eq!(cfg.get_string_slice("a.d"), vec!["1", "2"]);
        assert!(cfg.get_bool("a.e"));

        #[derive(serde::Deserialize)]
        struct A {
            b: u32,
            c: String,
            d: Vec<i32>,
            e: bool,
        }
        #[derive(serde::Deserialize)]
        struct Root {
            a: A,
        }

        let root: Root = cfg.unmarshal().unwrap();
        assert_eq!(root.a.b, 123);
        assert_eq!(root.a.c, "abc");
        assert_eq!(root.a.d, vec![1, 2]);
        assert!(root.a.e);

        let a: A = cfg.unmarshal_key("a").unwrap();
        assert_eq!(a.b, 123);
        assert!(a.e);
    }

    #[tokio::test]
    async fn test_raw_yaml_missing_key() {
        let url = serve(raw_yaml_doc()).await;
        let err = Config::new()
            .load_from_config_server_with_raw_yaml(&url, "app", "profile", "label", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::RemoteKeyMissing { ref key, .. } if key == "nope"));
    }

    // ── Flat properties ────────────────────────────────────────

    #[tokio::test]
    async fn test_load_flat_properties() {
        let url = serve(json!({
            "name": "app",
            "profiles": ["profile"],
            "propertySources": [
                {"name": "profile", "source": {"server.port": 8080, "feature.enabled": "true"}},
                {"name": "default", "source": {"server.port": 80, "server.host": "example.org"}}
            ]
        }))
        .await;

        let cfg = Config::new();
        cfg.load_from_config_server(&url, "app", "profile", "label")
            .await
            .unwrap();
        assert_eq!(cfg.get_int("server.port"), 8080);
        assert_eq!(cfg.get_string("server.host"), "example.org");
        assert!(cfg.get_bool("feature.enabled"));
    }

    #[tokio::test]
    async fn test_client_fetch_and_lookup() {
        let url = serve(raw_yaml_doc()).await;
        let mut client = ConfigServerClient::new(&url, "app", "profile", "label");
        client.fetch().await.unwrap();
        assert_eq!(client.remote().version.as_deref(), Some("12345"));
        assert_eq!(client.get_string("profile").as_deref(), Some("profile"));
    }

    #[tokio::test]
    async fn test_client_bool_accepts_short_forms() {
        let url = serve(json!({
            "name": "app",
            "propertySources": [
                {"name": "profile", "source": {"b": "1", "t": "T", "f": "FALSE", "bad": "yes"}}
            ]
        }))
        .await;
        let mut client = ConfigServerClient::new(&url, "app", "profile", "label");
        client.fetch().await.unwrap();
        assert_eq!(client.get_bool("b"), Some(true));
        assert_eq!(client.get_bool("t"), Some(true));
        assert_eq!(client.get_bool("f"), Some(false));
        assert_eq!(client.get_bool("bad"), None);
    }

    // ── Transport failures ─────────────────────────────────────

    #[tokio::test]
    async fn test_unknown_path_is_remote_error() {
        let url = serve(raw_yaml_doc()).await;
        let err = Config::new()
            .load_from_config_server(&url, "other", "profile", "label")
            .await
            .unwrap_err();
        match err {
            StrataError::Remote { url, reason } => {
                assert!(url.ends_with("/other/profile/label"));
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
