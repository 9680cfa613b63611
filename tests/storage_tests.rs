//! Storage backend tests

#[cfg(feature = "native-fs")]
mod filesystem_tests {
    use kw_mapper::mappers::{FileTableMapper, Mapper, MapperMap, PageContentMapper};
    use kw_mapper::records::{EntryType, Record, page_record};
    use kw_mapper::storage::formats::SeparatedElements;
    use kw_mapper::storage::{StorageBackend, StorageError, filesystem::FileSystemStorageBackend};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::runtime::Runtime;

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_read_write_roundtrip() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let backend = FileSystemStorageBackend::new(temp.path());

            backend.write_file("site/index.htm", b"<h1>Hi</h1>").await.unwrap();
            assert_eq!(backend.read_file("site/index.htm").await.unwrap(), b"<h1>Hi</h1>");
            assert!(backend.dir_exists("site").await.unwrap());
            assert_eq!(
                backend.list_files("site").await.unwrap(),
                vec!["index.htm".to_string()]
            );

            backend.delete_file("site/index.htm").await.unwrap();
            assert!(!backend.file_exists("site/index.htm").await.unwrap());
            assert!(matches!(
                backend.read_file("site/index.htm").await,
                Err(StorageError::FileNotFound(_))
            ));
        });
    }

    #[test]
    fn test_path_traversal_blocked() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let backend = FileSystemStorageBackend::new(temp.path());

            let result = backend.read_file("../etc/passwd").await;
            assert!(matches!(result, Err(StorageError::PermissionDenied(_))));

            let result = backend.write_file("data/../../escape.txt", b"x").await;
            assert!(matches!(result, Err(StorageError::PermissionDenied(_))));
        });
    }

    fn users(backend: &Arc<FileSystemStorageBackend>) -> Record {
        let mut map = MapperMap::new("users");
        map.set_relation("id", "0")
            .set_relation("login", "1")
            .set_relation("rank", "2")
            .add_primary_key("id");
        let mapper = FileTableMapper::new(
            map,
            Arc::clone(backend) as Arc<dyn StorageBackend>,
            "conf/users.txt",
            Box::new(SeparatedElements::new(":", "\n")),
        );
        let mut record = Record::with_mapper(Arc::new(mapper));
        record
            .add_entry("id", EntryType::Integer { max: 9999 })
            .unwrap()
            .add_entry("login", EntryType::String { max_length: 32 })
            .unwrap()
            .add_entry("rank", EntryType::Float { max: 10.0 })
            .unwrap();
        record
    }

    #[test]
    fn test_file_table_on_disk() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let backend = Arc::new(FileSystemStorageBackend::new(temp.path()));

            let template = users(&backend);
            for (login, rank) in [("admin", 9.5), ("guest", 1.0)] {
                let mut user = template.blank();
                user.set("login", login).unwrap();
                user.set("rank", rank).unwrap();
                assert!(user.save(false).await.unwrap());
            }
            let written = std::fs::read_to_string(temp.path().join("conf/users.txt")).unwrap();
            assert_eq!(written, "1:admin:9.5:\n2:guest:1:");

            let mut guest = users(&backend).blank();
            guest.set("login", "guest").unwrap();
            assert!(guest.load().await.unwrap());
            assert_eq!(guest.get("id").unwrap().as_i64(), Some(2));
            assert_eq!(guest.get("rank").unwrap().as_f64(), Some(1.0));
        });
    }

    #[test]
    fn test_parallel_saves_keep_both_rows() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let backend = Arc::new(FileSystemStorageBackend::new(temp.path()));

            let template = users(&backend);
            let mut first = template.blank();
            first.set("login", "a").unwrap();
            let mut second = template.blank();
            second.set("login", "b").unwrap();
            let (saved_first, saved_second) = tokio::join!(first.save(true), second.save(true));
            assert!(saved_first.unwrap());
            assert!(saved_second.unwrap());

            let written = std::fs::read_to_string(temp.path().join("conf/users.txt")).unwrap();
            assert_eq!(written, "1:a::\n2:b::");
            assert_eq!(template.blank().count().await.unwrap(), 2);
        });
    }

    #[test]
    fn test_page_content_on_disk() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let backend = Arc::new(FileSystemStorageBackend::new(temp.path()));
            let mapper: Arc<dyn Mapper> = Arc::new(PageContentMapper::new(
                "pages",
                Arc::clone(&backend) as Arc<dyn StorageBackend>,
            ));

            let mut page = page_record(Arc::clone(&mapper)).unwrap();
            page.set("path", "news/today.txt").unwrap();
            page.set("content", "Fresh news").unwrap();
            assert!(page.save(false).await.unwrap());
            assert_eq!(
                std::fs::read_to_string(temp.path().join("news/today.txt")).unwrap(),
                "Fresh news"
            );

            let mut missing = page_record(Arc::clone(&mapper)).unwrap();
            missing.set("path", "news/yesterday.txt").unwrap();
            assert_eq!(missing.count().await.unwrap(), 0);
            assert!(!missing.delete().await.unwrap());

            assert!(page.delete().await.unwrap());
            assert!(!backend.file_exists("news/today.txt").await.unwrap());
        });
    }
}
