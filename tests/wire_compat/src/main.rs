fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use blockload_protocol::{
        BlobProperties, BlockId, EncryptionArtifact, UploadTarget, block_list_xml,
        parse_block_list,
    };
    use blockload_uploader::UploadResult;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- JSON shapes handed to the registration call ---

    #[test]
    fn fixture_encryption_artifact() {
        let artifact = roundtrip_test::<EncryptionArtifact>("encryption_artifact.json");
        assert_eq!(artifact.iv.len(), 12);
        assert_eq!(artifact.tag.len(), 16);
        assert_eq!(artifact.range.len(), 1024 * 1024);
    }

    #[test]
    fn fixture_upload_result() {
        let result = roundtrip_test::<UploadResult>("upload_result.json");
        assert_eq!(result.block_count, 3);
        assert_eq!(result.block_ids.len(), result.block_count);

        let artifacts = result.artifacts.unwrap();
        assert_eq!(artifacts.len(), 3);
        let covered: u64 = artifacts.iter().map(|a| a.range.len()).sum();
        assert_eq!(covered, result.total_size);
        for (i, id) in result.block_ids.iter().enumerate() {
            assert_eq!(id.index() as usize, i);
        }
    }

    #[test]
    fn fixture_upload_target() {
        let target = roundtrip_test::<UploadTarget>("upload_target.json");
        assert!(target.url.contains("sig="));
        assert_eq!(target.headers.len(), 1);
    }

    #[test]
    fn fixture_blob_properties() {
        let props = roundtrip_test::<BlobProperties>("blob_properties.json");
        assert_eq!(props.blob_type.as_deref(), Some("BlockBlob"));
        assert_eq!(props.committed_block_count, Some(3));
    }

    // --- Commit body ---

    #[test]
    fn fixture_block_list_xml() {
        let fixture = read_fixture("block_list.xml");
        let ids: Vec<BlockId> = (0..3).map(|i| BlockId::new(i).unwrap()).collect();

        assert_eq!(block_list_xml(&ids), fixture.trim_end());
        assert_eq!(parse_block_list(&fixture).unwrap(), ids);
    }

    #[test]
    fn block_ids_are_fixed_width_and_query_safe() {
        for index in [0u32, 1, 9, 10, 999, 1000, 49_999] {
            let encoded = BlockId::new(index).unwrap().encoded();
            assert_eq!(encoded.len(), 8, "{index} -> {encoded}");
            assert!(
                encoded.chars().all(|c| c.is_ascii_alphanumeric()),
                "{index} -> {encoded}"
            );
        }
    }
}
