//! Integration tests for the Kowabunga provider using wiremock
//!
//! These tests drive the provider through its public Provider interface
//! against a mocked Kowabunga API and check the requests it issues.

use std::collections::HashMap;
use std::time::Duration;

use kowabunga_core::differ::{Diff, diff};
use kowabunga_core::provider::{ErrorKind, Provider};
use kowabunga_core::resource::{Resource, Value};
use kowabunga_provider::schemas::resource_schema;
use kowabunga_provider::{KowabungaProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn provider(server: &MockServer) -> KowabungaProvider {
    KowabungaProvider::configure(&ProviderConfig::new(server.uri(), TOKEN))
        .expect("provider should configure")
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Regions `r1` ("eu-north") and `r2` ("eu-west"), listed but not addressable by name
async fn mount_regions(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/region"))
        .respond_with(ok(json!(["r1", "r2"])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/region/r1"))
        .respond_with(ok(json!({"id": "r1", "name": "eu-north", "domain": "north.acme"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/region/r2"))
        .respond_with(ok(json!({"id": "r2", "name": "eu-west", "domain": "west.acme"})))
        .mount(server)
        .await;
}

mod resource_lifecycle {
    use super::*;

    /// Create sends the object with the API key and returns its ID
    #[tokio::test]
    async fn test_create_region() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/region"))
            .and(header("X-API-Key", TOKEN))
            .and(body_partial_json(json!({"name": "eu-west", "domain": "acme.internal"})))
            .respond_with(ok(json!({
                "id": "r1",
                "name": "eu-west",
                "description": "",
                "domain": "acme.internal"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("region", "eu-west")
            .with_attribute("name", Value::from("eu-west"))
            .with_attribute("domain", Value::from("acme.internal"));
        let state = provider(&server).create(&resource).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("r1"));
        assert_eq!(state.attributes["id"], Value::from("r1"));
        assert_eq!(state.attributes["desc"], Value::from(""));
    }

    /// Parent references given by name are resolved through the collection
    #[tokio::test]
    async fn test_create_zone_resolves_region_name() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/region/r2/zone"))
            .respond_with(ok(json!({"id": "z1", "name": "eu-west-a"})))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("zone", "eu-west-a")
            .with_attribute("name", Value::from("eu-west-a"))
            .with_attribute("region", Value::from("eu-west"));
        let state = provider(&server).create(&resource).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("z1"));
        // Parent reference kept as written
        assert_eq!(state.attributes["region"], Value::from("eu-west"));
    }

    /// An unresolvable parent aborts before the object is created
    #[tokio::test]
    async fn test_unknown_parent_fails_resolution() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        Mock::given(method("POST"))
            .respond_with(ok(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let resource = Resource::new("vnet", "lan")
            .with_attribute("name", Value::from("lan"))
            .with_attribute("region", Value::from("ap-south"))
            .with_attribute("interface", Value::from("br0"));
        let err = provider(&server).create(&resource).await.unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Resolution {
                entity: "region".to_string()
            }
        );
        assert_eq!(err.label(), "Unknown region");
    }

    /// Default storage pools are flagged right after creation
    #[tokio::test]
    async fn test_create_default_storage_pool() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/region/r1/pool"))
            .and(body_partial_json(json!({
                "pool": "rbd",
                "cephPort": 3300
            })))
            .respond_with(ok(json!({"id": "p1", "name": "ssd", "pool": "rbd"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/region/r1/pool/p1/default"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("storage_pool", "ssd")
            .with_attribute("name", Value::from("ssd"))
            .with_attribute("region", Value::from("r1"))
            .with_attribute("pool", Value::from("rbd"))
            .with_attribute("port", Value::Int(3300))
            .with_attribute("default", Value::Bool(true));
        let state = provider(&server).create(&resource).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("p1"));
        assert_eq!(state.attributes["default"], Value::Bool(true));
    }

    /// Reading an object the platform no longer knows yields an absent state
    #[tokio::test]
    async fn test_read_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/team/t1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resource = Resource::new("team", "ops");
        let state = provider(&server).read(&resource, Some("t1")).await.unwrap();
        assert!(!state.exists);
    }

    /// Without an ID the object is looked up by name
    #[tokio::test]
    async fn test_read_by_name() {
        let server = MockServer::start().await;
        mount_regions(&server).await;

        let resource = Resource::new("region", "eu-west");
        let state = provider(&server).read(&resource, None).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("r2"));
        assert_eq!(state.attributes["domain"], Value::from("west.acme"));
    }

    /// Update sends the whole desired object
    #[tokio::test]
    async fn test_update_sends_whole_object() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/team/t1"))
            .and(body_partial_json(json!({
                "name": "ops",
                "description": "Operations",
                "users": ["u1", "u2"]
            })))
            .respond_with(ok(json!({
                "id": "t1",
                "name": "ops",
                "description": "Operations",
                "users": ["u2", "u1"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("team", "ops")
            .with_attribute("name", Value::from("ops"))
            .with_attribute("desc", Value::from("Operations"))
            .with_attribute(
                "users",
                Value::List(vec![Value::from("u2"), Value::from("u1")]),
            );
        let current = kowabunga_core::resource::State::not_found(resource.id.clone());
        let state = provider(&server)
            .update(&resource.id, "t1", &current, &resource)
            .await
            .unwrap();

        assert_eq!(
            state.attributes["users"],
            Value::List(vec![Value::from("u1"), Value::from("u2")])
        );
    }

    /// Deleting an object that is already gone succeeds
    #[tokio::test]
    async fn test_delete_tolerates_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/volume/v1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("volume", "data");
        provider(&server).delete(&resource, "v1").await.unwrap();
    }

    /// A resource's own delete deadline bounds the request
    #[tokio::test]
    async fn test_delete_honours_resource_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/volume/v1"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let resource = Resource::new("volume", "data").with_attribute(
            "timeouts",
            Value::Map(HashMap::from([("delete".to_string(), Value::from("1s"))])),
        );
        let err = provider(&server).delete(&resource, "v1").await.unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Timeout {
                operation: "delete".to_string()
            }
        );
    }

    /// A storage pool read back right after creation plans no change
    #[tokio::test]
    async fn test_storage_pool_without_address_is_stable() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        let pool = json!({
            "id": "p1",
            "name": "ssd",
            "description": "",
            "pool": "rbd",
            "cephAddress": "",
            "cephPort": 0,
            "cephSecretUuid": "",
            "cost": {"price": 0.0, "currency": "EUR"},
            "agents": []
        });
        Mock::given(method("POST"))
            .and(path("/api/v1/region/r1/pool"))
            .respond_with(ok(pool.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pool/p1"))
            .respond_with(ok(pool))
            .mount(&server)
            .await;

        let resource = Resource::new("storage_pool", "ssd")
            .with_attribute("name", Value::from("ssd"))
            .with_attribute("region", Value::from("r1"))
            .with_attribute("pool", Value::from("rbd"));
        let p = provider(&server);
        p.create(&resource).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .unwrap()
            .body_json()
            .unwrap();
        assert!(sent.get("cephAddress").is_none());

        let current = p.read(&resource, Some("p1")).await.unwrap();
        let desired = p.prepare(&resource).unwrap();
        let schema = resource_schema("storage_pool").unwrap();
        assert!(matches!(diff(&desired, &current, &schema), Diff::NoChange(_)));
    }

    /// Path parameters stay within their segment
    #[tokio::test]
    async fn test_reference_cannot_climb_out_of_its_collection() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/zone/z1"))
            .respond_with(ok(json!({"id": "z1", "name": "eu-west-a"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ok(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let resource = Resource::new("zone", "b")
            .with_attribute("name", Value::from("b"))
            .with_attribute("region", Value::from("../zone/z1"));
        let err = provider(&server).create(&resource).await.unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Resolution {
                entity: "region".to_string()
            }
        );
    }

    /// API failures carry the remote message
    #[tokio::test]
    async fn test_remote_error_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"message": "user already exists"})),
            )
            .mount(&server)
            .await;

        let resource = Resource::new("user", "jdoe")
            .with_attribute("name", Value::from("jdoe"))
            .with_attribute("email", Value::from("jdoe@acme.com"))
            .with_attribute("role", Value::from("user"));
        let err = provider(&server).create(&resource).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Remote);
        assert!(err.message.contains("user already exists"));
        assert_eq!(err.label(), "Kowabunga Error");
    }

    /// Humans get a password reset, robots an API token
    #[tokio::test]
    async fn test_create_user_follow_up_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user"))
            .respond_with(ok(json!({
                "id": "u1",
                "name": "jdoe",
                "email": "jdoe@acme.com",
                "role": "user"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/user/u1/resetPassword"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/user/u1/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resource = Resource::new("user", "jdoe")
            .with_attribute("name", Value::from("jdoe"))
            .with_attribute("email", Value::from("jdoe@acme.com"))
            .with_attribute("role", Value::from("user"));
        let state = provider(&server).create(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("u1"));
    }

    /// The subnet size is read from the project's private subnet, so a new
    /// size plans a replacement
    #[tokio::test]
    async fn test_project_subnet_size_change_forces_replacement() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/project/p1"))
            .respond_with(ok(json!({
                "id": "p1",
                "name": "acme",
                "privateSubnets": [
                    {"key": "r2", "value": "s2"},
                    {"key": "r1", "value": "s1"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s1"))
            .respond_with(ok(json!({
                "id": "s1", "name": "acme-r1", "cidr": "10.1.0.0/26", "gateway": "10.1.0.1"
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let schema = resource_schema("project").unwrap();
        let desired = Resource::new("project", "acme")
            .with_attribute("name", Value::from("acme"))
            .with_attribute("subnet_size", Value::Int(26));
        let current = p.read(&desired, Some("p1")).await.unwrap();
        assert_eq!(current.attributes["subnet_size"], Value::Int(26));
        assert!(!diff(&desired, &current, &schema).is_change());

        let resized = desired.with_attribute("subnet_size", Value::Int(24));
        match diff(&resized, &current, &schema) {
            Diff::Replace { attributes, .. } => assert_eq!(attributes, vec!["subnet_size"]),
            other => panic!("expected a replacement, got {:?}", other),
        }
    }

    /// Creation reports the subnet size it asked for
    #[tokio::test]
    async fn test_create_project_records_subnet_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/project"))
            .and(query_param("subnetSize", "24"))
            .respond_with(ok(json!({"id": "p1", "name": "acme"})))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("project", "acme")
            .with_attribute("name", Value::from("acme"))
            .with_attribute("subnet_size", Value::Int(24));
        let state = provider(&server).create(&resource).await.unwrap();
        assert_eq!(state.attributes["subnet_size"], Value::Int(24));
    }
}

mod compute {
    use super::*;

    /// Adapters without addresses ask the platform for one and inherit the subnet network
    #[tokio::test]
    async fn test_create_adapter_with_assigned_address() {
        let server = MockServer::start().await;
        let subnet = json!({
            "id": "s1",
            "name": "lan",
            "cidr": "10.0.0.0/24",
            "gateway": "10.0.0.1"
        });
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s1"))
            .respond_with(ok(subnet))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/subnet/s1/adapter"))
            .and(query_param("assignIP", "true"))
            .respond_with(ok(json!({
                "id": "a1",
                "name": "eth0",
                "mac": "52:54:00:aa:bb:cc",
                "addresses": ["10.0.0.10"],
                "reserved": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("adapter", "eth0")
            .with_attribute("name", Value::from("eth0"))
            .with_attribute("subnet", Value::from("s1"));
        let state = provider(&server).create(&resource).await.unwrap();

        assert_eq!(
            state.attributes["addresses"],
            Value::List(vec![Value::from("10.0.0.10")])
        );
        assert_eq!(state.attributes["netmask"], Value::from("255.255.255.0"));
        assert_eq!(state.attributes["netmask_bitsize"], Value::Int(24));
        assert_eq!(state.attributes["gateway"], Value::from("10.0.0.1"));
    }

    async fn mount_adapter_in_subnet(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/adapter/a1"))
            .respond_with(ok(json!({
                "id": "a1",
                "name": "eth0",
                "mac": "52:54:00:aa:bb:cc",
                "addresses": ["10.0.0.10"],
                "reserved": false
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s1"))
            .respond_with(ok(json!({
                "id": "s1", "name": "lan", "cidr": "10.0.0.0/24", "gateway": "10.0.0.1"
            })))
            .mount(server)
            .await;
    }

    /// A read adapter carries the network of its declared subnet
    #[tokio::test]
    async fn test_read_adapter_fills_subnet_network() {
        let server = MockServer::start().await;
        mount_adapter_in_subnet(&server).await;

        let resource = Resource::new("adapter", "eth0")
            .with_attribute("name", Value::from("eth0"))
            .with_attribute("subnet", Value::from("s1"));
        let state = provider(&server).read(&resource, Some("a1")).await.unwrap();

        assert_eq!(state.attributes["cidr"], Value::from("10.0.0.0/24"));
        assert_eq!(state.attributes["netmask"], Value::from("255.255.255.0"));
        assert_eq!(state.attributes["gateway"], Value::from("10.0.0.1"));
    }

    /// Without a declared subnet, the one listing the adapter is used
    #[tokio::test]
    async fn test_read_adapter_finds_its_subnet() {
        let server = MockServer::start().await;
        mount_adapter_in_subnet(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet"))
            .respond_with(ok(json!(["s0", "s1"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s0/adapters"))
            .respond_with(ok(json!(["a0"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s1/adapters"))
            .respond_with(ok(json!(["a1"])))
            .mount(&server)
            .await;

        let resource = Resource::new("adapter", "eth0");
        let state = provider(&server).read(&resource, Some("a1")).await.unwrap();

        assert_eq!(state.attributes["netmask_bitsize"], Value::Int(24));
        assert_eq!(state.attributes["gateway"], Value::from("10.0.0.1"));
    }

    /// Sizes are configured in gigabytes and sent in bytes
    #[tokio::test]
    async fn test_create_kompute_sends_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/project/p1"))
            .respond_with(ok(json!({"id": "p1", "name": "acme"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/zone/z1"))
            .respond_with(ok(json!({"id": "z1", "name": "eu-west-a"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/project/p1/zone/z1/kompute"))
            .and(query_param("public", "false"))
            .and(body_partial_json(json!({
                "vcpus": 2,
                "memory": 4294967296i64,
                "disk": 21474836480i64,
                "dataDisk": 0
            })))
            .respond_with(ok(json!({
                "id": "k1",
                "name": "web",
                "vcpus": 2,
                "memory": 4294967296i64,
                "disk": 21474836480i64,
                "dataDisk": 0,
                "ip": "10.0.0.20"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("kompute", "web")
            .with_attribute("name", Value::from("web"))
            .with_attribute("project", Value::from("p1"))
            .with_attribute("zone", Value::from("z1"))
            .with_attribute("vcpus", Value::Int(2))
            .with_attribute("mem", Value::Int(4))
            .with_attribute("disk", Value::Int(20));
        let state = provider(&server).create(&resource).await.unwrap();

        assert_eq!(state.attributes["mem"], Value::Int(4));
        assert_eq!(state.attributes["ip"], Value::from("10.0.0.20"));
    }
}

mod network {
    use super::*;

    fn ipsec_body() -> serde_json::Value {
        json!({
            "id": "i1",
            "name": "tunnel",
            "ip": "1.2.3.4",
            "remoteIp": "5.6.7.8",
            "remoteSubnet": "192.168.0.0/24",
            "preSharedKey": "psk",
            "phase1DhGroupNumber": 14,
            "phase1IntegrityAlgorithm": "SHA256",
            "phase1EncryptionAlgorithm": "AES256",
            "phase2DhGroupNumber": 14,
            "phase2IntegrityAlgorithm": "SHA256",
            "phase2EncryptionAlgorithm": "AES256"
        })
    }

    /// IPsec connections are identified through their kawaii
    #[tokio::test]
    async fn test_ipsec_lifecycle_uses_composite_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/kawaii/k1"))
            .respond_with(ok(json!({"id": "k1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/kawaii/k1/ipsec"))
            .and(body_partial_json(json!({
                "remoteIp": "5.6.7.8",
                "dpdTimeout": "240s",
                "rekeyTime": "2h"
            })))
            .respond_with(ok(ipsec_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/kawaii/k1/ipsec/i1"))
            .respond_with(ok(ipsec_body()))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/kawaii/k1/ipsec/i1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Resource::new("kawaii_ipsec", "tunnel")
            .with_attribute("name", Value::from("tunnel"))
            .with_attribute("kawaii", Value::from("k1"))
            .with_attribute("pre_shared_key", Value::from("psk"))
            .with_attribute("remote_peer", Value::from("5.6.7.8"))
            .with_attribute("remote_subnet", Value::from("192.168.0.0/24"))
            .with_attribute("phase1_dh_group_number", Value::Int(14))
            .with_attribute("phase1_integrity_algorithm", Value::from("SHA256"))
            .with_attribute("phase1_encryption_algorithm", Value::from("AES256"))
            .with_attribute("phase2_dh_group_number", Value::Int(14))
            .with_attribute("phase2_integrity_algorithm", Value::from("SHA256"))
            .with_attribute("phase2_encryption_algorithm", Value::from("AES256"));
        let p = provider(&server);
        let state = p.create(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("k1/i1"));
        assert_eq!(state.attributes["ip"], Value::from("1.2.3.4"));

        let read = p.read(&resource, Some("k1/i1")).await.unwrap();
        assert!(read.exists);
        assert_eq!(read.attributes["kawaii"], Value::from("k1"));
        assert_eq!(read.attributes["dpd_action"], Value::from("restart"));

        p.delete(&resource, "k1/i1").await.unwrap();
    }

    /// A kawaii referenced by name reads back as that name, so the
    /// connection is not replaced
    #[tokio::test]
    async fn test_ipsec_read_keeps_kawaii_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/kawaii"))
            .respond_with(ok(json!(["k1"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/kawaii/k1"))
            .respond_with(ok(json!({"id": "k1", "name": "acme-eu-west"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/kawaii/k1/ipsec/i1"))
            .respond_with(ok(ipsec_body()))
            .mount(&server)
            .await;

        let resource = Resource::new("kawaii_ipsec", "tunnel")
            .with_attribute("kawaii", Value::from("acme-eu-west"));
        let p = provider(&server);
        let read = p.read(&resource, Some("k1/i1")).await.unwrap();
        assert_eq!(read.attributes["kawaii"], Value::from("acme-eu-west"));

        let schema = resource_schema("kawaii_ipsec").unwrap();
        assert!(schema.replacement_attributes(&read.attributes, &resource.attributes).is_empty());

        let moved = resource.with_attribute("kawaii", Value::from("k2"));
        let read = p.read(&moved, Some("k1/i1")).await.unwrap();
        assert_eq!(read.attributes["kawaii"], Value::from("k1"));
        assert_eq!(
            schema.replacement_attributes(&read.attributes, &moved.attributes),
            vec!["kawaii"]
        );
    }

    /// Invalid port ranges never reach the API
    #[tokio::test]
    async fn test_kawaii_rules_are_validated_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ok(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let rule = Value::Map(HashMap::from([(
            "ports".to_string(),
            Value::from("8080-80"),
        )]));
        let resource = Resource::new("kawaii", "gw")
            .with_attribute("project", Value::from("p1"))
            .with_attribute("region", Value::from("r1"))
            .with_attribute("egress_rules", Value::List(vec![rule]));
        let err = provider(&server).create(&resource).await.unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "egress_rules[0].ports".to_string()
            }
        );
    }
}

mod data_sources {
    use super::*;

    #[tokio::test]
    async fn test_region_lookup_by_name() {
        let server = MockServer::start().await;
        mount_regions(&server).await;

        let resource =
            Resource::new("region", "west").with_attribute("name", Value::from("eu-west"));
        let state = provider(&server).read_data_source(&resource).await.unwrap();

        assert_eq!(state.attributes["id"], Value::from("r2"));
    }

    #[tokio::test]
    async fn test_region_lookup_without_match_leaves_id_empty() {
        let server = MockServer::start().await;
        mount_regions(&server).await;

        let resource =
            Resource::new("region", "south").with_attribute("name", Value::from("ap-south"));
        let state = provider(&server).read_data_source(&resource).await.unwrap();

        assert_eq!(state.attributes["id"], Value::from(""));
    }

    #[tokio::test]
    async fn test_regions_catalogue() {
        let server = MockServer::start().await;
        mount_regions(&server).await;

        let resource = Resource::new("regions", "all");
        let state = provider(&server).read_data_source(&resource).await.unwrap();

        let regions = state.attributes["regions"].as_map().unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions["eu-west"], Value::from("r2"));
    }

    #[tokio::test]
    async fn test_subnet_lookup_by_application() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet"))
            .respond_with(ok(json!(["s1", "s2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s1"))
            .respond_with(ok(json!({
                "id": "s1", "name": "lan", "cidr": "10.0.0.0/24", "gateway": "10.0.0.1",
                "application": "user"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/subnet/s2"))
            .respond_with(ok(json!({
                "id": "s2", "name": "storage", "cidr": "10.1.0.0/24", "gateway": "10.1.0.1",
                "application": "ceph"
            })))
            .mount(&server)
            .await;

        let resource = Resource::new("subnet", "ceph").with_attribute("app", Value::from("ceph"));
        let state = provider(&server).read_data_source(&resource).await.unwrap();

        assert_eq!(state.attributes["id"], Value::from("s2"));
        assert_eq!(state.attributes["name"], Value::from("storage"));
    }

    #[tokio::test]
    async fn test_zones_of_region_skip_unreadable_entries() {
        let server = MockServer::start().await;
        mount_regions(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/region/r1/zones"))
            .respond_with(ok(json!(["z1", "z2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/zone/z1"))
            .respond_with(ok(json!({"id": "z1", "name": "eu-north-a"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/zone/z2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resource =
            Resource::new("zones", "north").with_attribute("region", Value::from("eu-north"));
        let state = provider(&server).read_data_source(&resource).await.unwrap();

        let zones = state.attributes["zones"].as_map().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones["eu-north-a"], Value::from("z1"));
    }
}
