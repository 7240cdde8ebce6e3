//! File-based storage backend implementation for the sale backend.
//!
//! One file per key under a configured directory. Writes go to a temporary
//! file first and are renamed into place, so a queue entry transition is
//! atomic even if the process dies mid-write.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation.
pub struct FileStorage {
	/// Directory all entries live in.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at the given directory.
	///
	/// The directory is created if it does not exist.
	pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path)
			.map_err(|e| StorageError::Backend(format!("Failed to create storage dir: {}", e)))?;
		Ok(Self { base_path })
	}

	/// Maps a storage key to a file name.
	///
	/// Keys contain `:` separators and hex ids; everything outside
	/// `[a-zA-Z0-9._-]` is percent-escaped so the name is safe on any
	/// filesystem and the mapping stays reversible.
	fn encode_key(key: &str) -> String {
		let mut name = String::with_capacity(key.len());
		for byte in key.bytes() {
			match byte {
				b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
					name.push(byte as char)
				}
				_ => name.push_str(&format!("%{:02x}", byte)),
			}
		}
		name
	}

	fn decode_key(name: &str) -> Option<String> {
		let mut key = String::with_capacity(name.len());
		let bytes = name.as_bytes();
		let mut i = 0;
		while i < bytes.len() {
			if bytes[i] == b'%' {
				let hex = name.get(i + 1..i + 3)?;
				let value = u8::from_str_radix(hex, 16).ok()?;
				key.push(value as char);
				i += 3;
			} else {
				key.push(bytes[i] as char);
				i += 1;
			}
		}
		Some(key)
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.base_path.join(Self::encode_key(key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.path_for(key);
		match fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(format!("Read failed: {}", e))),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.path_for(key);
		let tmp = path.with_extension("tmp");

		fs::write(&tmp, value)
			.await
			.map_err(|e| StorageError::Backend(format!("Write failed: {}", e)))?;
		fs::rename(&tmp, &path)
			.await
			.map_err(|e| StorageError::Backend(format!("Rename failed: {}", e)))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.path_for(key);
		match fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(format!("Delete failed: {}", e))),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(fs::try_exists(self.path_for(key)).await.unwrap_or(false))
	}

	async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut entries = fs::read_dir(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(format!("List failed: {}", e)))?;

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(format!("List failed: {}", e)))?
		{
			let name = entry.file_name().to_string_lossy().into_owned();
			if Path::new(&name).extension().is_some_and(|ext| ext == "tmp") {
				continue;
			}
			if let Some(key) = Self::decode_key(&name) {
				if key.starts_with(prefix) {
					keys.push(key);
				}
			} else {
				tracing::debug!("Skipping file {:?}: not an encoded storage key", name);
			}
		}
		keys.sort();
		Ok(keys)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_roundtrip_and_list() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();

		storage
			.set_bytes("queue:0xdeadbeef", b"entry".to_vec())
			.await
			.unwrap();
		storage
			.set_bytes("outcome:0xdeadbeef", b"done".to_vec())
			.await
			.unwrap();

		assert_eq!(
			storage.get_bytes("queue:0xdeadbeef").await.unwrap(),
			b"entry".to_vec()
		);
		assert_eq!(
			storage.list("queue:").await.unwrap(),
			vec!["queue:0xdeadbeef".to_string()]
		);

		storage.delete("queue:0xdeadbeef").await.unwrap();
		assert!(matches!(
			storage.get_bytes("queue:0xdeadbeef").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_key_encoding_is_reversible() {
		let key = "queue:0xABCdef%";
		let encoded = FileStorage::encode_key(key);
		assert!(!encoded.contains(':'));
		assert_eq!(FileStorage::decode_key(&encoded).unwrap(), key);
	}

	#[tokio::test]
	async fn test_list_skips_foreign_files() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();

		storage
			.set_bytes("queue:0xdeadbeef", b"entry".to_vec())
			.await
			.unwrap();
		// Not a valid percent-escaped key; list must skip it, not fail.
		std::fs::write(dir.path().join("stray%zz"), b"junk").unwrap();

		assert_eq!(
			storage.list("queue:").await.unwrap(),
			vec!["queue:0xdeadbeef".to_string()]
		);
	}

	#[tokio::test]
	async fn test_delete_missing_is_ok() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();
		storage.delete("queue:0xmissing").await.unwrap();
	}
}
