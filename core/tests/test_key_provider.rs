// # 📂 `tests/test_key_provider.rs`

// * ✅ static and file providers hand out the asset key
// * ✅ a reader opened through a provider decrypts the asset
// * ✅ key encodings (hex, base64, raw file) agree

#[cfg(test)]
mod tests {
    use std::fs;

    use media_crypt::constants::KEY_FILENAME;
    use media_crypt::crypto::{read_key_file, Credentials, FileKeyProvider, Key, KeyProvider, StaticKeyProvider};
    use media_crypt::pipeline::{encrypt_asset, AssetReader, PipelineConfig};
    use media_crypt::segment::MemorySource;
    use media_crypt::types::StreamError;

    fn publish(root: &std::path::Path, asset_id: &str, key: &Key) -> Vec<u8> {
        let parts = vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()];
        let joined = parts.concat();
        encrypt_asset(&MemorySource::media_only(parts), &root.join(asset_id), key, &PipelineConfig::default())
            .unwrap();
        joined
    }

    #[test]
    fn file_provider_serves_the_written_key() {
        let root = tempfile::tempdir().unwrap();
        let key = Key::generate().unwrap();
        let plaintext = publish(root.path(), "movie-1", &key);

        let provider = FileKeyProvider::new(root.path());
        assert_eq!(provider.fetch_key("movie-1", &Credentials::anonymous()).unwrap(), key);

        let reader =
            AssetReader::open_with_provider(root.path(), "movie-1", &provider, &Credentials::bearer("ignored"))
                .unwrap();
        let (back, _) = reader.decrypt_all().unwrap();
        assert_eq!(back, plaintext);
    }

    #[test]
    fn file_provider_without_key_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let key = Key::generate().unwrap();
        let parts = vec![b"x".to_vec()];
        encrypt_asset(
            &MemorySource::media_only(parts),
            &root.path().join("hidden"),
            &key,
            &PipelineConfig::default().with_persist_key(false),
        )
        .unwrap();

        let provider = FileKeyProvider::new(root.path());
        assert!(matches!(
            provider.fetch_key("hidden", &Credentials::anonymous()),
            Err(StreamError::Io(_))
        ));
    }

    #[test]
    fn static_provider_opens_any_asset() {
        let root = tempfile::tempdir().unwrap();
        let key = Key::from_bytes([0x5c; 32]);
        let a = publish(root.path(), "a", &key);
        let b = publish(root.path(), "b", &key);

        let provider = StaticKeyProvider::new(key);
        for (id, expected) in [("a", a), ("b", b)] {
            let reader = AssetReader::open_with_provider(root.path(), id, &provider, &Credentials::anonymous()).unwrap();
            assert_eq!(reader.decrypt_all().unwrap().0, expected);
        }
    }

    #[test]
    fn key_encodings_agree() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::generate().unwrap();
        let path = dir.path().join(KEY_FILENAME);
        fs::write(&path, key.as_bytes()).unwrap();

        assert_eq!(read_key_file(&path).unwrap(), key);
        assert_eq!(Key::from_base64(&key.to_base64()).unwrap(), key);
        assert_eq!(Key::from_hex(&hex::encode(key.as_bytes())).unwrap(), key);
        assert!(Key::from_hex("abcd").is_err());

        fs::write(&path, [0u8; 31]).unwrap();
        assert!(matches!(read_key_file(&path), Err(StreamError::EncryptionFailure(_))));
    }
}
