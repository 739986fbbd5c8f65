
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use tracing::{debug, info};
use uuid::Uuid;

use super::{DistanceMetric, EmbeddedChunk, SearchHit, StoredChunk, TABLE_NAME};
use crate::ingest::DocumentMetadata;
use crate::{RagError, Result};

/// LanceDB dataset holding embedded chunks in a single table
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    metric: DistanceMetric,
    dimension: Option<usize>,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("metric", &self.metric)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// `file://` URI for an existing directory. Relative paths are resolved
/// first so they are not read as a URI host.
fn connection_uri(path: &Path) -> Result<String> {
    let absolute = std::fs::canonicalize(path).map_err(|e| {
        RagError::Database(format!(
            "Failed to resolve vector database directory {}: {e}",
            path.display()
        ))
    })?;
    Ok(format!("file://{}", absolute.display()))
}

fn db_err(context: &str) -> impl FnOnce(lancedb::Error) -> RagError + '_ {
    move |e| RagError::Database(format!("{context}: {e}"))
}

impl VectorStore {
    /// Whether a store with a chunk table has been written at `path`
    #[inline]
    pub fn exists(path: &Path) -> bool {
        path.join(format!("{TABLE_NAME}.lance")).is_dir()
    }

    /// Open the store at `path`, creating the directory if needed.
    /// The table itself is created on first insert.
    #[inline]
    pub async fn open(path: &Path, metric: DistanceMetric) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {e}",
                path.display()
            ))
        })?;

        let uri = connection_uri(path)?;
        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(db_err("Failed to connect to LanceDB"))?;

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            metric,
            dimension: None,
        };

        if let Some(table) = store.open_table().await? {
            let dimension = detect_dimension(&table).await?;
            info!(
                "Opened vector store at {} (dimension {})",
                path.display(),
                dimension
            );
            store.dimension = Some(dimension);
        } else {
            debug!("No chunk table yet at {}", path.display());
        }

        Ok(store)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Vector dimension of the stored table, if any rows were ever written
    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_err("Failed to list tables"))?;

        if !names.iter().any(|name| name == TABLE_NAME) {
            return Ok(None);
        }

        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map(Some)
            .map_err(db_err("Failed to open table"))
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        match self.open_table().await? {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(db_err("Failed to count rows")),
            None => Ok(0),
        }
    }

    /// Append all records in one write. Returns the number of rows added.
    #[inline]
    pub async fn add(&mut self, records: &[EmbeddedChunk]) -> Result<usize> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(0);
        };

        let dimension = first.vector.len();
        if dimension == 0 {
            return Err(RagError::Database("cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(RagError::Database(format!(
                "inconsistent vector dimensions in batch: {} and {}",
                dimension,
                bad.vector.len()
            )));
        }
        if let Some(existing) = self.dimension.filter(|&d| d != dimension) {
            return Err(RagError::Database(format!(
                "vector dimension {dimension} does not match stored dimension {existing}; \
                 use a fresh persistence directory for a different embedding model"
            )));
        }

        let table = match self.open_table().await? {
            Some(table) => table,
            None => {
                info!("Creating chunk table with {} dimensions", dimension);
                self.connection
                    .create_empty_table(TABLE_NAME, chunk_schema(dimension)?)
                    .execute()
                    .await
                    .map_err(db_err("Failed to create table"))?
            }
        };
        self.dimension = Some(dimension);

        let first_seq = table
            .count_rows(None)
            .await
            .map_err(db_err("Failed to count rows"))? as u64;

        let batch = record_batch(records, dimension, first_seq)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(db_err("Failed to insert chunks"))?;

        info!("Stored {} chunks", records.len());
        Ok(records.len())
    }

    /// Up to `k` nearest chunks ordered by distance, ties broken by insertion order
    #[inline]
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_table().await? else {
            debug!("Search on empty store");
            return Ok(Vec::new());
        };
        if let Some(dimension) = self.dimension.filter(|&d| d != query.len()) {
            return Err(RagError::Database(format!(
                "query dimension {} does not match stored dimension {dimension}",
                query.len()
            )));
        }

        // Widen the fetch until the k-th distance is not tied with the cut-off
        let mut limit = k;
        loop {
            let mut hits = self.nearest(&table, query, limit).await?;
            hits.sort_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.chunk.seq.cmp(&b.chunk.seq))
            });

            let exhausted = hits.len() < limit;
            let settled = hits
                .get(k - 1)
                .zip(hits.last())
                .is_none_or(|(kth, last)| last.distance > kth.distance);

            if exhausted || settled {
                hits.truncate(k);
                debug!("Search returned {} hits", hits.len());
                return Ok(hits);
            }
            limit = limit.saturating_mul(2);
        }
    }

    async fn nearest(&self, table: &Table, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let mut stream = table
            .vector_search(query)
            .map_err(db_err("Failed to create vector search"))?
            .column("vector")
            .distance_type(self.metric.to_lancedb())
            .limit(limit)
            .execute()
            .await
            .map_err(db_err("Failed to execute search"))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_err("Failed to read result stream"))?
        {
            hits.extend(parse_hits(&batch)?);
        }
        Ok(hits)
    }
}

async fn detect_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(db_err("Failed to get table schema"))?;

    schema
        .field_with_name("vector")
        .ok()
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| RagError::Database("Could not determine vector dimension".to_string()))
}

fn chunk_schema(dimension: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("vector dimension {dimension} is too large")))?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size,
            ),
            false,
        ),
        Field::new("seq", DataType::UInt64, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("offset", DataType::UInt64, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("token_count", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ])))
}

fn record_batch(records: &[EmbeddedChunk], dimension: usize, first_seq: u64) -> Result<RecordBatch> {
    let schema = chunk_schema(dimension)?;
    let created_at = Utc::now().to_rfc3339();

    let ids: Vec<String> = records.iter().map(|_| Uuid::new_v4().to_string()).collect();
    let flat: Vec<f32> = records
        .iter()
        .flat_map(|r| r.vector.iter().copied())
        .collect();
    let seqs: Vec<u64> = (first_seq..).take(records.len()).collect();

    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("vector dimension {dimension} is too large")))?;
    let vectors = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, false)),
        list_size,
        Arc::new(Float32Array::from(flat)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {e}")))?;

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vectors),
        Arc::new(UInt64Array::from(seqs)),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.metadata.source.as_str()),
        )),
        Arc::new(UInt32Array::from_iter(
            records.iter().map(|r| r.chunk.metadata.page),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.chunk.offset as u64),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.chunk.chunk_index as u64),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.text.as_str()),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records
                .iter()
                .map(|r| u32::try_from(r.chunk.token_count).unwrap_or(u32::MAX)),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|_| created_at.as_str()),
        )),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {e}")))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {name} column type")))
}

fn parse_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let ids = column::<StringArray>(batch, "id")?;
    let seqs = column::<UInt64Array>(batch, "seq")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let offsets = column::<UInt64Array>(batch, "offset")?;
    let chunk_indices = column::<UInt64Array>(batch, "chunk_index")?;
    let contents = column::<StringArray>(batch, "content")?;
    let token_counts = column::<UInt32Array>(batch, "token_count")?;
    let created_ats = column::<StringArray>(batch, "created_at")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    Ok((0..batch.num_rows())
        .map(|row| SearchHit {
            chunk: StoredChunk {
                id: ids.value(row).to_string(),
                seq: seqs.value(row),
                text: contents.value(row).to_string(),
                metadata: DocumentMetadata {
                    source: sources.value(row).to_string(),
                    page: (!pages.is_null(row)).then(|| pages.value(row)),
                },
                offset: offsets.value(row),
                chunk_index: chunk_indices.value(row),
                token_count: token_counts.value(row),
                created_at: created_ats.value(row).to_string(),
            },
            distance: distances.value(row),
        })
        .collect())
}
