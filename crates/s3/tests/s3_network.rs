//! Round-trip against a real S3 bucket
//!
//! Ignored by default so the suite passes without credentials. Run with
//! `cargo test -p depot-s3 -- --ignored` after exporting
//! AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_REGION, and
//! DEPOT_S3_TEST_BUCKET (plus AWS_ENDPOINT for S3-compatible stores).

use std::io::Cursor;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use tokio::io::AsyncReadExt;

use depot_core::{Folder, Settings, object_stream};
use depot_s3::S3Folder;

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

fn client_from_env() -> Client {
    let credentials = Credentials::new(
        env("AWS_ACCESS_KEY_ID"),
        env("AWS_SECRET_ACCESS_KEY"),
        None,
        None,
        "depot-network-test",
    );
    let mut config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(env("AWS_REGION")))
        .credentials_provider(credentials);
    if let Ok(endpoint) = std::env::var("AWS_ENDPOINT") {
        config = config.endpoint_url(endpoint).force_path_style(true);
    }
    Client::from_conf(config.build())
}

#[tokio::test]
#[ignore = "requires S3 credentials and DEPOT_S3_TEST_BUCKET"]
async fn network_round_trip() {
    let folder = S3Folder::new(
        client_from_env(),
        env("DEPOT_S3_TEST_BUCKET"),
        "depot-test/",
        &Settings::new(),
    )
    .unwrap();
    let body = b"depot network round trip".to_vec();

    folder
        .put_object("round-trip", object_stream(Cursor::new(body.clone())))
        .await
        .unwrap();
    assert!(folder.exists("round-trip").await.unwrap());

    let mut stream = folder.read_object("round-trip").await.unwrap();
    let mut read_back = Vec::new();
    stream.read_to_end(&mut read_back).await.unwrap();
    assert_eq!(read_back, body);

    let paths = vec!["round-trip".to_string()];
    folder.delete_objects(&paths).await.unwrap();
    folder.delete_objects(&paths).await.unwrap();
    assert!(!folder.exists("round-trip").await.unwrap());
}
