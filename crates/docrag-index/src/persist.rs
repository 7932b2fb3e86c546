//! On-disk layout of one logical index.
//!
//! Every save goes to a fresh generation directory holding `vectors.arrow` and
//! `metadata.json`. The `CURRENT` file names the active generation and is
//! replaced with a single rename, so a reader sees the old pair or the new one
//! and never a mix. The generation that was active before a save is kept for
//! readers that resolved the pointer just before the swap; older ones are
//! pruned.
//!
//! The vector file's schema metadata records the row count, the dimension and
//! the BLAKE3 digest of the exact metadata bytes written alongside it, so a
//! reader can still reject a pair that does not belong together.

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch};
use arrow_ipc::reader::FileReader;
use arrow_ipc::writer::FileWriter;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use docrag_core::types::ChunkMeta;
use docrag_core::{Error, Result};

use crate::flat::FlatIpIndex;
use crate::schema::{build_vector_schema, META_BUILT_AT, META_DIM, META_METADATA_DIGEST, META_ROWS, VECTOR_COLUMN};

pub const VECTORS_FILE: &str = "vectors.arrow";
pub const METADATA_FILE: &str = "metadata.json";
pub const CURRENT_FILE: &str = "CURRENT";
pub const GENERATION_PREFIX: &str = "gen-";

/// Root of one index location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
	pub dir: PathBuf,
	pub current: PathBuf,
}

/// The two artifacts of one saved build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
	pub name: String,
	pub dir: PathBuf,
	pub vectors: PathBuf,
	pub metadata: PathBuf,
}

impl Generation {
	pub fn exist(&self) -> bool {
		self.vectors.is_file() && self.metadata.is_file()
	}
}

impl IndexPaths {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		let dir = dir.into();
		Self { current: dir.join(CURRENT_FILE), dir }
	}

	pub fn generation(&self, name: &str) -> Generation {
		let dir = self.dir.join(name);
		Generation { name: name.to_string(), vectors: dir.join(VECTORS_FILE), metadata: dir.join(METADATA_FILE), dir }
	}

	/// Generation named by `CURRENT`, or `None` when nothing was saved here.
	pub fn active(&self) -> Result<Option<Generation>> {
		let raw = match fs::read_to_string(&self.current) {
			Ok(raw) => raw,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(source) => return Err(Error::Read { path: self.current.clone(), source }),
		};
		let name = raw.trim();
		if !name.starts_with(GENERATION_PREFIX) || name.contains(['/', '\\']) || name.contains("..") {
			return Err(corrupt(&self.current, format!("invalid generation name {name:?}")));
		}
		Ok(Some(self.generation(name)))
	}

	/// Whether the active generation has both artifacts on disk.
	pub fn exist(&self) -> bool {
		matches!(self.active(), Ok(Some(g)) if g.exist())
	}
}

fn corrupt(path: &Path, reason: impl ToString) -> Error {
	Error::Corrupt { path: path.to_path_buf(), reason: reason.to_string() }
}

fn next_generation_name(paths: &IndexPaths) -> String {
	let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.9fZ");
	let mut name = format!("{GENERATION_PREFIX}{stamp}");
	let mut n = 1;
	while paths.dir.join(&name).exists() {
		name = format!("{GENERATION_PREFIX}{stamp}-{n}");
		n += 1;
	}
	name
}

pub fn write_index(paths: &IndexPaths, flat: &FlatIpIndex, metadata: &[ChunkMeta]) -> Result<()> {
	fs::create_dir_all(&paths.dir)?;
	let previous = paths.active().ok().flatten().map(|g| g.name);
	let generation = paths.generation(&next_generation_name(paths));
	fs::create_dir(&generation.dir)?;

	if let Err(e) = write_generation(&generation, flat, metadata) {
		if let Err(cleanup) = fs::remove_dir_all(&generation.dir) {
			warn!(dir = %generation.dir.display(), error = %cleanup, "could not remove unfinished generation");
		}
		return Err(e);
	}

	let pointer_tmp = paths.dir.join(format!("{CURRENT_FILE}.tmp"));
	write_synced(&pointer_tmp, generation.name.as_bytes())?;
	fs::rename(&pointer_tmp, &paths.current)?;
	debug!(dir = %paths.dir.display(), generation = %generation.name, rows = flat.len(), "index generation activated");

	prune_generations(paths, &generation.name, previous.as_deref());
	Ok(())
}

fn write_generation(generation: &Generation, flat: &FlatIpIndex, metadata: &[ChunkMeta]) -> Result<()> {
	let meta_bytes = serde_json::to_vec_pretty(metadata).map_err(|e| corrupt(&generation.metadata, e))?;
	let digest = blake3::hash(&meta_bytes).to_hex().to_string();
	write_synced(&generation.metadata, &meta_bytes)?;
	write_vectors(&generation.vectors, flat, &digest)
}

fn prune_generations(paths: &IndexPaths, active: &str, previous: Option<&str>) {
	let Ok(entries) = fs::read_dir(&paths.dir) else { return };
	for entry in entries.flatten() {
		let name = entry.file_name().to_string_lossy().into_owned();
		if !name.starts_with(GENERATION_PREFIX) || name == active || Some(name.as_str()) == previous {
			continue;
		}
		if let Err(e) = fs::remove_dir_all(entry.path()) {
			warn!(generation = %name, error = %e, "could not prune old index generation");
		}
	}
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
	let mut file = File::create(path)?;
	file.write_all(bytes)?;
	file.sync_all()?;
	Ok(())
}

fn write_vectors(path: &Path, flat: &FlatIpIndex, digest: &str) -> Result<()> {
	let dim = i32::try_from(flat.dim()).map_err(|e| corrupt(path, e))?;
	let schema_meta = HashMap::from([
		(META_ROWS.to_string(), flat.len().to_string()),
		(META_DIM.to_string(), flat.dim().to_string()),
		(META_METADATA_DIGEST.to_string(), digest.to_string()),
		(META_BUILT_AT.to_string(), chrono::Utc::now().to_rfc3339()),
	]);
	let schema = build_vector_schema(dim, schema_meta);
	let vectors: Vec<Option<Vec<Option<f32>>>> = flat.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
	let column = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim);
	let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(column)]).map_err(|e| corrupt(path, e))?;

	let mut file = File::create(path)?;
	{
		let mut writer = FileWriter::try_new(&mut file, &schema).map_err(|e| corrupt(path, e))?;
		writer.write(&batch).map_err(|e| corrupt(path, e))?;
		writer.finish().map_err(|e| corrupt(path, e))?;
	}
	file.sync_all()?;
	Ok(())
}

/// Reads the active generation and checks that its two artifacts belong together.
pub fn read_index(paths: &IndexPaths) -> Result<(FlatIpIndex, Vec<ChunkMeta>)> {
	let generation = paths
		.active()?
		.filter(Generation::exist)
		.ok_or_else(|| Error::IndexNotFound { path: paths.dir.clone() })?;
	let meta_bytes =
		fs::read(&generation.metadata).map_err(|source| Error::Read { path: generation.metadata.clone(), source })?;
	let metadata: Vec<ChunkMeta> = serde_json::from_slice(&meta_bytes).map_err(|e| corrupt(&generation.metadata, e))?;
	let digest = blake3::hash(&meta_bytes).to_hex().to_string();

	let (flat, schema_meta) = read_vectors(&generation.vectors)?;
	match schema_meta.get(META_METADATA_DIGEST) {
		Some(d) if *d == digest => {}
		Some(_) => return Err(corrupt(&generation.metadata, "metadata does not match the vector file")),
		None => return Err(corrupt(&generation.vectors, "missing metadata digest")),
	}
	if flat.len() != metadata.len() {
		return Err(corrupt(
			&generation.vectors,
			format!("{} vectors but {} metadata records", flat.len(), metadata.len()),
		));
	}
	Ok((flat, metadata))
}

fn read_vectors(path: &Path) -> Result<(FlatIpIndex, HashMap<String, String>)> {
	let file = File::open(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
	let reader = FileReader::try_new(file, None).map_err(|e| corrupt(path, e))?;
	let schema_meta = reader.schema().metadata().clone();
	let dim: usize = schema_meta
		.get(META_DIM)
		.and_then(|d| d.parse().ok())
		.filter(|d| *d > 0)
		.ok_or_else(|| corrupt(path, "missing or invalid dimension"))?;
	let rows: usize = schema_meta
		.get(META_ROWS)
		.and_then(|r| r.parse().ok())
		.ok_or_else(|| corrupt(path, "missing row count"))?;
	let expected = rows.checked_mul(dim).ok_or_else(|| corrupt(path, "row count overflow"))?;

	// Sized from the batches actually present, not from the header.
	let mut data = Vec::new();
	for batch in reader {
		let batch = batch.map_err(|e| corrupt(path, e))?;
		let column = batch
			.column_by_name(VECTOR_COLUMN)
			.and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
			.ok_or_else(|| corrupt(path, "vector column missing"))?;
		if column.value_length() as usize != dim {
			return Err(corrupt(path, "vector width does not match header"));
		}
		for i in 0..column.len() {
			let row = column.value(i);
			data.extend_from_slice(row.as_primitive::<Float32Type>().values());
		}
		if data.len() > expected {
			return Err(corrupt(path, format!("more than the {rows} rows in the header")));
		}
	}
	if data.len() != expected {
		return Err(corrupt(path, format!("expected {rows} rows, found {}", data.len() / dim)));
	}
	Ok((FlatIpIndex::from_raw(dim, data), schema_meta))
}
