//! Embedding blob encoding and the `cosine_similarity` SQL function.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Encode a vector as little-endian `f32` bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes. Returns `None` if the length is not a
/// multiple of four.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Cosine similarity (`1 - cosine distance`) of two vectors.
///
/// `None` when the vectors are empty, differ in length, or either has zero
/// norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Register `cosine_similarity(blob, blob)` on a connection.
///
/// The function yields NULL for NULL inputs and for blobs that cannot be
/// compared, so such rows sort last under `ORDER BY ... DESC`.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "cosine_similarity",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a: Option<Vec<u8>> = ctx.get(0)?;
            let b: Option<Vec<u8>> = ctx.get(1)?;
            let similarity = match (a, b) {
                (Some(a), Some(b)) => match (decode_embedding(&a), decode_embedding(&b)) {
                    (Some(a), Some(b)) => cosine_similarity(&a, &b),
                    _ => None,
                },
                _ => None,
            };
            Ok(similarity)
        },
    )
}
