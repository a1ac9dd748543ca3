#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decodes packed engine cell buffers into typed per-cell records.

use flowmap_core::{
    CellCoord, CellState, DecodeError, DecodedFrame, GridDimensions, PackedFrame, LAND_FIELD,
    PACKED_STRIDE, STREAM_FIELD, WATER_FIELD,
};

/// Byte offset of the record describing `cell` within a packed buffer.
pub fn record_offset(dimensions: GridDimensions, cell: CellCoord) -> Result<usize, DecodeError> {
    if !dimensions.contains(cell) {
        return Err(DecodeError::OutOfRange { cell, dimensions });
    }

    let row = cell.row() as usize;
    let column = cell.column() as usize;
    let width = dimensions.width() as usize;
    Ok(row * width * PACKED_STRIDE + column * PACKED_STRIDE)
}

/// Reads the record of a single cell without decoding the whole frame.
pub fn decode_cell(frame: PackedFrame<'_>, cell: CellCoord) -> Result<CellState, DecodeError> {
    ensure_length(frame)?;
    let offset = record_offset(frame.dimensions(), cell)?;
    Ok(read_record(&frame.bytes()[offset..offset + PACKED_STRIDE]))
}

/// Decodes every record of a packed frame in row-major order.
///
/// The buffer is only read; buffers whose length does not match the
/// dimensions are rejected.
pub fn decode(frame: PackedFrame<'_>) -> Result<DecodedFrame, DecodeError> {
    ensure_length(frame)?;
    let cells = frame
        .bytes()
        .chunks_exact(PACKED_STRIDE)
        .map(read_record)
        .collect();
    DecodedFrame::new(frame.dimensions(), cells)
}

fn ensure_length(frame: PackedFrame<'_>) -> Result<(), DecodeError> {
    let expected = frame.dimensions().cell_count() * PACKED_STRIDE;
    let actual = frame.bytes().len();
    if actual != expected {
        return Err(DecodeError::LengthMismatch { expected, actual });
    }
    Ok(())
}

fn read_record(record: &[u8]) -> CellState {
    CellState::new(
        record[LAND_FIELD],
        record[WATER_FIELD],
        record[STREAM_FIELD] != 0,
    )
}
