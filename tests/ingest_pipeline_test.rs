use anyhow::Result;
use std::sync::Arc;

use csv_ingest::config::Config;
use csv_ingest::infra::InMemoryObjectStore;
use csv_ingest::pipeline::ingestion::content_digest;
use csv_ingest::{IngestError, IngestUseCase, Stage};

const UPLOADS: &str = "uploads";
const RESULTS: &str = "results";

const USERS_CONFIG: &str = r#"
[store]
source_bucket = "uploads"
destination_bucket = "results"

[[schema.columns]]
name = "user_id"
type = "string"
required = true
unique = true

[[schema.columns]]
name = "email"
type = "string"
required = true
rules = [{ kind = "email" }]

[[schema.columns]]
name = "age"
type = "integer"
rules = [{ kind = "range", min = 0, max = 130 }]

[[schema.columns]]
name = "signup_date"
type = "date"
required = true
"#;

const USERS_CSV: &str = "\
UserId,Email,Age,signupDate,notes
u1,a@example.com,34,2024-01-05,hi
u2,not-an-email,200,01/15/2024,
u3,c@example.com,n/a,2024/02/01,x
,d@example.com,40,2024-03-01,
u1,e@example.com,22,2024-03-02,dup
u5,f@example.com,3.0,yesterday,
";

fn use_case_from(config_toml: &str, store: Arc<InMemoryObjectStore>) -> IngestUseCase {
    let config = Config::from_toml_str(config_toml).unwrap();
    IngestUseCase::new(store, config.schema.clone(), config.ingest_settings())
}

fn text(store: &InMemoryObjectStore, key: &str) -> Option<String> {
    store
        .object(RESULTS, key)
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

#[tokio::test]
async fn two_row_example_splits_as_expected() -> Result<()> {
    let config = r#"
[store]
destination_bucket = "results"

[[schema.columns]]
name = "id"
type = "string"
required = true

[[schema.columns]]
name = "amount"
type = "number"
required = true
"#;
    let store = Arc::new(InMemoryObjectStore::new());
    let body = b"id,amount\n1,10.5\n,bad\n".to_vec();
    let digest = content_digest(&body);
    store.insert(UPLOADS, "sales.csv", body);

    let summary = use_case_from(config, store.clone()).run("sales.csv").await?;

    assert_eq!(summary.valid_count, 1);
    assert_eq!(summary.invalid_count, 1);
    assert_eq!(
        text(&store, &format!("processed/{}.csv", digest)).unwrap(),
        "id,amount\n1,10.5\n"
    );
    assert_eq!(
        text(&store, &format!("errors/{}.csv", digest)).unwrap(),
        "id,amount,reasons\n,bad,missing_required_field:id;type_mismatch:amount\n"
    );
    Ok(())
}

#[tokio::test]
async fn users_file_is_normalized_validated_and_partitioned() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    let digest = content_digest(USERS_CSV.as_bytes());
    store.insert(UPLOADS, "raw/users.csv", USERS_CSV.as_bytes().to_vec());

    let summary = use_case_from(USERS_CONFIG, store.clone())
        .run("raw/users.csv")
        .await?;

    assert_eq!(summary.source_key, "raw/users.csv");
    assert_eq!(summary.total_rows, 6);
    assert_eq!(summary.valid_count + summary.invalid_count, summary.total_rows);
    assert_eq!((summary.valid_count, summary.invalid_count), (2, 4));

    assert_eq!(
        text(&store, &format!("processed/{}.csv", digest)).unwrap(),
        "user_id,email,age,signup_date\n\
         u1,a@example.com,34,2024-01-05\n\
         u3,c@example.com,,2024-02-01\n"
    );
    assert_eq!(
        text(&store, &format!("errors/{}.csv", digest)).unwrap(),
        "user_id,email,age,signup_date,reasons\n\
         u2,not-an-email,200,2024-01-15,invalid_email:email;out_of_range:age\n\
         ,d@example.com,40,2024-03-01,missing_required_field:user_id\n\
         u1,e@example.com,22,2024-03-02,duplicate_value:user_id\n\
         u5,f@example.com,3,yesterday,type_mismatch:signup_date\n"
    );
    Ok(())
}

#[tokio::test]
async fn reupload_is_skipped_without_writes() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "a.csv", USERS_CSV.as_bytes().to_vec());
    // same bytes under another key
    store.insert(UPLOADS, "b.csv", USERS_CSV.as_bytes().to_vec());
    let ingest = use_case_from(USERS_CONFIG, store.clone());

    let first = ingest.run("a.csv").await?;
    assert!(!first.skipped);
    let writes = store.put_count();
    let artifacts = store.keys(RESULTS);
    let processed_before = text(&store, &first.output_paths[1]);

    for key in ["a.csv", "b.csv"] {
        let again = ingest.run(key).await?;
        assert!(again.skipped);
        assert_eq!(again.digest, first.digest);
        assert_ne!(again.run_id, first.run_id);
        assert!(again.output_paths.is_empty());
        assert_eq!(again.total_rows, 0);
    }

    assert_eq!(store.put_count(), writes);
    assert_eq!(store.keys(RESULTS), artifacts);
    assert_eq!(text(&store, &first.output_paths[1]), processed_before);
    Ok(())
}

#[tokio::test]
async fn all_valid_file_writes_no_errors_artifact() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    let body = "user_id,email,signup_date\nu1,a@x.io,2024-01-01\nu2,b@x.io,2024-01-02\n";
    let digest = content_digest(body.as_bytes());
    store.insert(UPLOADS, "ok.csv", body.as_bytes().to_vec());

    let summary = use_case_from(USERS_CONFIG, store.clone()).run("ok.csv").await?;

    assert_eq!(summary.invalid_count, 0);
    assert_eq!(store.keys(RESULTS), vec![format!("processed/{}.csv", digest)]);
    assert_eq!(summary.output_paths, vec![format!("processed/{}.csv", digest)]);
    // missing optional column is rendered empty
    assert_eq!(
        text(&store, &summary.output_paths[0]).unwrap(),
        "user_id,email,age,signup_date\nu1,a@x.io,,2024-01-01\nu2,b@x.io,,2024-01-02\n"
    );
    Ok(())
}

#[tokio::test]
async fn header_only_file_still_marks_content_processed() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "empty.csv", b"user_id,email,age,signup_date\n".to_vec());
    let ingest = use_case_from(USERS_CONFIG, store.clone());

    let summary = ingest.run("empty.csv").await?;
    assert_eq!((summary.total_rows, summary.valid_count, summary.invalid_count), (0, 0, 0));
    assert_eq!(
        text(&store, &summary.output_paths[0]).unwrap(),
        "user_id,email,age,signup_date\n"
    );
    assert!(ingest.run("empty.csv").await?.skipped);
    Ok(())
}

#[tokio::test]
async fn missing_required_column_makes_every_row_invalid() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "partial.csv", b"user_id,email\nu1,a@x.io\nu2,b@x.io\n".to_vec());

    let summary = use_case_from(USERS_CONFIG, store.clone()).run("partial.csv").await?;
    assert_eq!((summary.valid_count, summary.invalid_count), (0, 2));
    let errors = text(&store, &summary.output_paths[0]).unwrap();
    assert_eq!(errors.lines().count(), 3);
    assert!(errors
        .lines()
        .skip(1)
        .all(|line| line.ends_with("missing_required_field:signup_date")));
    Ok(())
}

#[tokio::test]
async fn malformed_files_fail_at_parse() {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "ragged.csv", b"user_id,email\nu1\n".to_vec());
    store.insert(UPLOADS, "collide.csv", b"userId,user_id\nu1,u2\n".to_vec());
    let ingest = use_case_from(USERS_CONFIG, store.clone());

    for key in ["ragged.csv", "collide.csv"] {
        let err = ingest.run(key).await.unwrap_err();
        assert_eq!(err.stage, Stage::Parse, "{key}");
        assert!(matches!(err.source, IngestError::Parse(_)));
    }
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn failed_errors_write_leaves_no_dedup_marker() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "users.csv", USERS_CSV.as_bytes().to_vec());
    store.fail_writes_under("errors/");
    let ingest = use_case_from(USERS_CONFIG, store.clone());

    let err = ingest.run("users.csv").await.unwrap_err();
    assert_eq!(err.stage, Stage::WriteInvalid);
    assert!(matches!(err.source, IngestError::Write { .. }));
    assert!(store.keys(RESULTS).is_empty());

    // a retry after recovery processes the file in full
    store.clear_failures();
    let summary = ingest.run("users.csv").await?;
    assert!(!summary.skipped);
    assert_eq!(store.keys(RESULTS).len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_processed_write_is_retried_not_skipped() -> Result<()> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "users.csv", USERS_CSV.as_bytes().to_vec());
    store.fail_writes_under("processed/");
    let ingest = use_case_from(USERS_CONFIG, store.clone());

    let err = ingest.run("users.csv").await.unwrap_err();
    assert_eq!(err.stage, Stage::WriteValid);
    let digest = content_digest(USERS_CSV.as_bytes());
    let errors_key = format!("errors/{}.csv", digest);
    assert_eq!(store.keys(RESULTS), vec![errors_key.clone()]);
    let first_errors = text(&store, &errors_key);

    store.clear_failures();
    let summary = ingest.run("users.csv").await?;
    assert!(!summary.skipped);
    assert_eq!(text(&store, &errors_key), first_errors);
    assert!(store.object(RESULTS, &format!("processed/{}.csv", digest)).is_some());
    Ok(())
}
