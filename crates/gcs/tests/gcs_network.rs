//! Round-trip against a real GCS bucket
//!
//! Ignored by default so the suite passes without credentials. Run with
//! `cargo test -p depot-gcs -- --ignored` after exporting
//! GOOGLE_APPLICATION_CREDENTIALS (or the service-account variables the
//! store reads from the environment) and DEPOT_GCS_TEST_BUCKET.

use std::io::Cursor;
use std::sync::Arc;

use object_store::gcp::GoogleCloudStorageBuilder;
use tokio::io::AsyncReadExt;

use depot_core::{Folder, Settings, object_stream};
use depot_gcs::GcsFolder;

#[tokio::test]
#[ignore = "requires GCS credentials and DEPOT_GCS_TEST_BUCKET"]
async fn network_round_trip() {
    let bucket =
        std::env::var("DEPOT_GCS_TEST_BUCKET").expect("DEPOT_GCS_TEST_BUCKET must be set");
    let store = GoogleCloudStorageBuilder::from_env()
        .with_bucket_name(bucket)
        .build()
        .expect("bucket-scoped GCS store");

    let folder = GcsFolder::new(Arc::new(store), "depot-test", &Settings::new()).unwrap();
    let body = vec![7u8; 1 << 20];

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
