use anyhow::Result;
use baidu_netdisk_fs::netdisk_service::netdisk_models::{
    AsyncMode, ManagerOperation, OnDup, OneUploadRequest, Relocation, RenamePolicy,
};
use baidu_netdisk_fs::{AdapterError, FilesystemAdapter, Visibility, WriteOptions};
use tokio::io::AsyncReadExt;

use crate::common::fixtures::{adapter_with_root, test_adapter, TEST_TOKEN};
use crate::common::mock_netdisk_client::{staging_is_empty, MockNetdiskClient, RecordedCall};

fn adapter_error(err: &anyhow::Error) -> Option<&AdapterError> {
    err.downcast_ref::<AdapterError>()
}

#[tokio::test]
async fn test_file_exists_searches_parent_directory() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());
    env.client.insert_file("/backup/docs/a.txt", b"hello", 1_700_000_000);

    assert!(env.adapter.file_exists("docs/a.txt").await?);
    assert!(!env.adapter.file_exists("docs/missing.txt").await?);

    assert_eq!(
        env.client.calls()[0],
        RecordedCall::Search {
            key: "a.txt".to_string(),
            dir: "/backup/docs".to_string(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_file_exists_propagates_transport_failure() -> Result<()> {
    let env = adapter_with_root("", MockNetdiskClient::with_failures(&["search"]));

    let result = env.adapter.file_exists("a.txt").await;
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("Mock search failure"));
    Ok(())
}

#[tokio::test]
async fn test_directory_exists_only_for_directories() -> Result<()> {
    let env = test_adapter();
    env.client.insert_directory("/photos", 1_700_000_000);
    env.client.insert_file("/notes.txt", b"n", 1_700_000_000);

    assert!(env.adapter.directory_exists("photos").await?);
    assert!(!env.adapter.directory_exists("notes.txt").await?);
    assert!(!env.adapter.directory_exists("videos").await?);
    Ok(())
}

#[tokio::test]
async fn test_write_then_read_round_trip() -> Result<()> {
    let env = test_adapter();

    env.adapter
        .write("greeting.txt", b"hello netdisk", &WriteOptions::default())
        .await?;
    assert_eq!(env.client.content_of("/greeting.txt"), Some(b"hello netdisk".to_vec()));

    let contents = env.adapter.read("greeting.txt").await?;
    assert_eq!(contents, b"hello netdisk");
    Ok(())
}

#[tokio::test]
async fn test_write_under_root_uploads_absolute_path() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());

    env.adapter
        .write("a/b.txt", b"payload", &WriteOptions::default())
        .await?;

    let uploads: Vec<OneUploadRequest> = env
        .client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::OneUpload(request) => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].path, "/backup/a/b.txt");
    assert!(!uploads[0].is_dir);
    assert_eq!(uploads[0].rtype, RenamePolicy::Fail);
    assert!(uploads[0].local_path.is_some());
    Ok(())
}

#[tokio::test]
async fn test_write_passes_rename_policy() -> Result<()> {
    let env = test_adapter();

    env.adapter
        .write("a.txt", b"x", &WriteOptions::with_rtype(RenamePolicy::Overwrite))
        .await?;

    match &env.client.calls()[0] {
        RecordedCall::OneUpload(request) => assert_eq!(request.rtype, RenamePolicy::Overwrite),
        other => panic!("Unexpected call: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_write_stream_from_reader() -> Result<()> {
    let env = test_adapter();
    let mut reader: &[u8] = b"streamed contents";

    env.adapter
        .write_stream("stream.bin", &mut reader, &WriteOptions::default())
        .await?;

    assert_eq!(env.client.content_of("/stream.bin"), Some(b"streamed contents".to_vec()));
    Ok(())
}

#[tokio::test]
async fn test_write_removes_staged_file_on_success() -> Result<()> {
    let env = test_adapter();

    env.adapter
        .write("a.txt", b"temporary", &WriteOptions::default())
        .await?;

    let staged = env.client.staged_paths();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].starts_with(env.staging.path()));
    assert!(!staged[0].exists());
    assert!(staging_is_empty(env.staging.path()));
    Ok(())
}

#[tokio::test]
async fn test_write_removes_staged_file_on_upload_failure() -> Result<()> {
    let env = adapter_with_root("", MockNetdiskClient::with_failures(&["one_upload"]));

    let result = env
        .adapter
        .write("a.txt", b"doomed", &WriteOptions::default())
        .await;
    assert!(result.is_err());

    let staged = env.client.staged_paths();
    assert_eq!(staged.len(), 1);
    assert!(!staged[0].exists());
    assert!(staging_is_empty(env.staging.path()));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_leaves_nothing_in_staging() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt", b"abc", 1_700_000_000);

    let mut stream = env.adapter.read_stream("a.txt").await?;
    assert!(staging_is_empty(env.staging.path()));

    let mut contents = String::new();
    stream.read_to_string(&mut contents).await?;
    assert_eq!(contents, "abc");
    Ok(())
}

#[tokio::test]
async fn test_read_appends_access_token_to_direct_link() -> Result<()> {
    let env = test_adapter();
    let fs_id = env.client.insert_file("/a.txt", b"abc", 1_700_000_000);

    env.adapter.read("a.txt").await?;

    let urls = env.downloader.urls();
    assert_eq!(urls.len(), 1);
    let url = url::Url::parse(&urls[0])?;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("fid".to_string(), fs_id.to_string())));
    assert!(pairs.contains(&("access_token".to_string(), TEST_TOKEN.to_string())));

    assert!(env.client.calls().contains(&RecordedCall::FileMetas {
        fsids: vec![fs_id],
        dlink: true,
    }));
    Ok(())
}

#[tokio::test]
async fn test_read_missing_file_is_not_found() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());

    let err = env.adapter.read("nope.txt").await.unwrap_err();
    assert_eq!(
        adapter_error(&err),
        Some(&AdapterError::NotFound("/backup/nope.txt".to_string()))
    );

    // No metadata or download is attempted
    assert_eq!(env.client.calls().len(), 1);
    assert!(env.downloader.urls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_read_download_failure_propagates() -> Result<()> {
    let env = adapter_with_root("", MockNetdiskClient::with_failures(&["download"]));
    env.client.insert_file("/a.txt", b"abc", 1_700_000_000);

    let result = env.adapter.read("a.txt").await;
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("Mock download failure"));
    assert!(staging_is_empty(env.staging.path()));
    Ok(())
}

#[tokio::test]
async fn test_last_modified_and_file_size() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());
    env.client.insert_file("/backup/report.pdf", &[0u8; 2048], 1_650_000_000);

    let modified = env.adapter.last_modified("report.pdf").await?;
    assert_eq!(modified.path, "/backup/report.pdf");
    assert_eq!(modified.last_modified, Some(1_650_000_000));

    let size = env.adapter.file_size("report.pdf").await?;
    assert_eq!(size.path, "/backup/report.pdf");
    assert_eq!(size.file_size, Some(2048));
    Ok(())
}

#[tokio::test]
async fn test_metadata_of_missing_file_is_not_found() -> Result<()> {
    let env = test_adapter();

    let err = env.adapter.last_modified("ghost").await.unwrap_err();
    assert!(matches!(adapter_error(&err), Some(AdapterError::NotFound(_))));

    let err = env.adapter.file_size("ghost").await.unwrap_err();
    assert!(matches!(adapter_error(&err), Some(AdapterError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_delete_uses_filemanager() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());
    env.client.insert_file("/backup/old.log", b"old", 1_700_000_000);

    env.adapter.delete("old.log").await?;

    assert!(!env.client.contains("/backup/old.log"));
    assert_eq!(
        env.client.calls(),
        vec![RecordedCall::Manager {
            operation: ManagerOperation::Delete(vec!["/backup/old.log".to_string()]),
            mode: AsyncMode::Adaptive,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_delete_directory_matches_delete() -> Result<()> {
    let env = test_adapter();
    env.client.insert_directory("/tmp-dir", 1_700_000_000);

    env.adapter.delete_directory("tmp-dir").await?;

    assert!(!env.client.contains("/tmp-dir"));
    assert_eq!(
        env.client.calls(),
        vec![RecordedCall::Manager {
            operation: ManagerOperation::Delete(vec!["/tmp-dir".to_string()]),
            mode: AsyncMode::Adaptive,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_create_directory_sends_directory_upload() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());

    env.adapter
        .create_directory("new/dir", &WriteOptions::default())
        .await?;

    assert_eq!(
        env.client.calls(),
        vec![RecordedCall::OneUpload(OneUploadRequest::directory(
            "/backup/new/dir",
            RenamePolicy::Fail
        ))]
    );
    assert!(env.adapter.directory_exists("new/dir").await?);
    Ok(())
}

#[tokio::test]
async fn test_move_file_relocates_with_fail_on_conflict() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());
    env.client.insert_file("/backup/a.txt", b"data", 1_700_000_000);

    env.adapter
        .move_file("a.txt", "archive/b.txt", &WriteOptions::default())
        .await?;

    assert_eq!(
        env.client.calls(),
        vec![RecordedCall::Manager {
            operation: ManagerOperation::Move(vec![Relocation {
                path: "/backup/a.txt".to_string(),
                dest: "/backup/archive".to_string(),
                newname: "b.txt".to_string(),
                ondup: OnDup::Fail,
            }]),
            mode: AsyncMode::Adaptive,
        }]
    );
    assert!(!env.client.contains("/backup/a.txt"));
    assert_eq!(env.client.content_of("/backup/archive/b.txt"), Some(b"data".to_vec()));
    Ok(())
}

#[tokio::test]
async fn test_copy_file_keeps_source() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt", b"data", 1_700_000_000);

    env.adapter
        .copy_file("a.txt", "copy.txt", &WriteOptions::with_rtype(RenamePolicy::Overwrite))
        .await?;

    // Relocations fail on conflict whatever the caller asked for
    assert_eq!(
        env.client.calls(),
        vec![RecordedCall::Manager {
            operation: ManagerOperation::Copy(vec![Relocation {
                path: "/a.txt".to_string(),
                dest: "/".to_string(),
                newname: "copy.txt".to_string(),
                ondup: OnDup::Fail,
            }]),
            mode: AsyncMode::Adaptive,
        }]
    );
    assert!(env.client.contains("/a.txt"));
    assert_eq!(env.client.content_of("/copy.txt"), Some(b"data".to_vec()));
    Ok(())
}

#[tokio::test]
async fn test_manager_failure_propagates() -> Result<()> {
    let env = adapter_with_root("", MockNetdiskClient::with_failures(&["manager"]));

    let err = env.adapter.delete("a.txt").await.unwrap_err();
    assert!(format!("{:#}", err).contains("Mock manager failure"));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_operations() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt", b"data", 1_700_000_000);

    let err = env
        .adapter
        .set_visibility("a.txt", Visibility::Public)
        .await
        .unwrap_err();
    assert_eq!(adapter_error(&err), Some(&AdapterError::Unsupported("set_visibility")));

    let err = env.adapter.visibility("a.txt").await.unwrap_err();
    assert_eq!(adapter_error(&err), Some(&AdapterError::Unsupported("visibility")));

    let err = env.adapter.mime_type("a.txt").await.unwrap_err();
    assert_eq!(adapter_error(&err), Some(&AdapterError::Unsupported("mime_type")));

    // None of them reach the remote side
    assert!(env.client.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_metadata_ignores_similarly_named_hits() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt.bak", &[0u8; 99], 1_600_000_000);
    env.client.insert_file("/a.txt", b"hello", 1_700_000_000);

    let size = env.adapter.file_size("a.txt").await?;
    assert_eq!(size.path, "/a.txt");
    assert_eq!(size.file_size, Some(5));

    let modified = env.adapter.last_modified("a.txt").await?;
    assert_eq!(modified.last_modified, Some(1_700_000_000));
    Ok(())
}

#[tokio::test]
async fn test_read_downloads_exact_match_only() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt.bak", b"backup copy", 1_600_000_000);
    let fs_id = env.client.insert_file("/a.txt", b"hello", 1_700_000_000);

    assert_eq!(env.adapter.read("a.txt").await?, b"hello");
    assert!(env.client.calls().contains(&RecordedCall::FileMetas {
        fsids: vec![fs_id],
        dlink: true,
    }));
    Ok(())
}

#[tokio::test]
async fn test_near_miss_alone_is_not_found() -> Result<()> {
    let env = test_adapter();
    env.client.insert_file("/a.txt.bak", b"backup copy", 1_600_000_000);

    // Existence follows the raw search result
    assert!(env.adapter.file_exists("a.txt").await?);

    let err = env.adapter.read("a.txt").await.unwrap_err();
    assert_eq!(
        adapter_error(&err),
        Some(&AdapterError::NotFound("/a.txt".to_string()))
    );
    let err = env.adapter.file_size("a.txt").await.unwrap_err();
    assert!(matches!(adapter_error(&err), Some(AdapterError::NotFound(_))));
    assert!(env.downloader.urls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_directory_exists_needs_exact_path() -> Result<()> {
    let env = test_adapter();
    env.client.insert_directory("/photos-2023", 1_700_000_000);

    assert!(!env.adapter.directory_exists("photos").await?);

    env.client.insert_directory("/photos", 1_700_000_000);
    assert!(env.adapter.directory_exists("photos").await?);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_write_succeeds_when_staged_file_is_already_gone() -> Result<()> {
    let env = test_adapter();
    env.client.consume_staged_uploads();

    env.adapter
        .write("a.txt", b"uploaded", &WriteOptions::default())
        .await?;

    assert_eq!(env.client.content_of("/a.txt"), Some(b"uploaded".to_vec()));
    assert!(staging_is_empty(env.staging.path()));
    Ok(())
}

#[tokio::test]
async fn test_root_itself_cannot_be_deleted_or_relocated() -> Result<()> {
    let env = adapter_with_root("/backup", MockNetdiskClient::new());
    env.client.insert_file("/backup/a.txt", b"data", 1_700_000_000);
    let options = WriteOptions::default();

    let err = env.adapter.delete("").await.unwrap_err();
    assert_eq!(adapter_error(&err), Some(&AdapterError::InvalidPath(String::new())));

    let err = env.adapter.delete_directory("/").await.unwrap_err();
    assert_eq!(adapter_error(&err), Some(&AdapterError::InvalidPath("/".to_string())));

    let err = env.adapter.move_file("", "elsewhere", &options).await.unwrap_err();
    assert!(matches!(adapter_error(&err), Some(AdapterError::InvalidPath(_))));

    let err = env.adapter.copy_file("a.txt", "", &options).await.unwrap_err();
    assert!(matches!(adapter_error(&err), Some(AdapterError::InvalidPath(_))));

    assert!(env.client.calls().is_empty());
    assert!(env.client.contains("/backup/a.txt"));
    Ok(())
}
