use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use flowmap_core::{ElevationWindow, GridDimensions, RasterError, RasterSource};
use flowmap_raster::{open, GeoTiffRaster, SourceLocation};

#[derive(Clone, Copy)]
enum Order {
    Little,
    Big,
}

#[derive(Clone, Copy)]
enum Layout {
    Strips { rows_per_strip: u32 },
    Tiles { width: u32, height: u32 },
}

#[derive(Clone, Copy)]
enum Format {
    U8,
    U16,
    I16,
    I32,
    F32,
    F64,
}

impl Format {
    fn bits(self) -> u16 {
        match self {
            Format::U8 => 8,
            Format::U16 | Format::I16 => 16,
            Format::I32 | Format::F32 => 32,
            Format::F64 => 64,
        }
    }

    fn code(self) -> u16 {
        match self {
            Format::U8 | Format::U16 => 1,
            Format::I16 | Format::I32 => 2,
            Format::F32 | Format::F64 => 3,
        }
    }

    fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }

    fn raw(self, value: f64) -> u64 {
        match self {
            Format::U8 => value as u8 as u64,
            Format::U16 => value as u16 as u64,
            Format::I16 => value as i16 as u16 as u64,
            Format::I32 => value as i32 as u32 as u64,
            Format::F32 => u64::from((value as f32).to_bits()),
            Format::F64 => value.to_bits(),
        }
    }
}

/// Describes a synthetic single-image TIFF.
struct TiffFixture {
    order: Order,
    width: u32,
    height: u32,
    format: Format,
    layout: Layout,
    deflate: bool,
    predictor: bool,
    samples_per_pixel: u16,
    elevation: fn(u32, u32) -> f64,
}

impl TiffFixture {
    fn new(width: u32, height: u32, format: Format, elevation: fn(u32, u32) -> f64) -> Self {
        Self {
            order: Order::Little,
            width,
            height,
            format,
            layout: Layout::Strips {
                rows_per_strip: height,
            },
            deflate: false,
            predictor: false,
            samples_per_pixel: 1,
            elevation,
        }
    }

    fn put(&self, out: &mut Vec<u8>, value: u64, size: usize) {
        let bytes = value.to_le_bytes();
        match self.order {
            Order::Little => out.extend_from_slice(&bytes[..size]),
            Order::Big => out.extend(bytes[..size].iter().rev()),
        }
    }

    fn chunk_geometry(&self) -> (u32, u32, u32, u32) {
        match self.layout {
            Layout::Strips { rows_per_strip } => (
                self.width,
                rows_per_strip,
                1,
                self.height.div_ceil(rows_per_strip),
            ),
            Layout::Tiles { width, height } => (
                width,
                height,
                self.width.div_ceil(width),
                self.height.div_ceil(height),
            ),
        }
    }

    fn chunk(&self, chunk_row: u32, chunk_column: u32) -> Vec<u8> {
        let (chunk_width, chunk_height, _, _) = self.chunk_geometry();
        let rows = match self.layout {
            Layout::Strips { .. } => chunk_height.min(self.height - chunk_row * chunk_height),
            Layout::Tiles { .. } => chunk_height,
        };
        let spp = usize::from(self.samples_per_pixel);
        let mut samples = Vec::new();
        for local_row in 0..rows {
            let mut row_samples: Vec<u64> = Vec::new();
            for local_column in 0..chunk_width {
                let row = chunk_row * chunk_height + local_row;
                let column = chunk_column * chunk_width + local_column;
                let value = if row < self.height && column < self.width {
                    (self.elevation)(row, column)
                } else {
                    0.0
                };
                row_samples.push(self.format.raw(value));
                for extra in 1..spp {
                    row_samples.push(self.format.raw(extra as f64 * 100.0));
                }
            }
            if self.predictor {
                let mask = if self.format.bytes() == 8 {
                    u64::MAX
                } else {
                    (1u64 << (8 * self.format.bytes())) - 1
                };
                for index in (spp..row_samples.len()).rev() {
                    row_samples[index] =
                        row_samples[index].wrapping_sub(row_samples[index - spp]) & mask;
                }
            }
            samples.extend(row_samples);
        }

        let mut bytes = Vec::new();
        for sample in samples {
            self.put(&mut bytes, sample, self.format.bytes());
        }
        if self.deflate {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&bytes).expect("in-memory write");
            bytes = encoder.finish().expect("in-memory finish");
        }
        bytes
    }

    fn encode(&self) -> Vec<u8> {
        let (chunk_width, chunk_height, across, down) = self.chunk_geometry();
        let mut out = Vec::new();
        match self.order {
            Order::Little => out.extend_from_slice(b"II"),
            Order::Big => out.extend_from_slice(b"MM"),
        }
        self.put(&mut out, 42, 2);
        self.put(&mut out, 0, 4);

        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for chunk_row in 0..down {
            for chunk_column in 0..across {
                let chunk = self.chunk(chunk_row, chunk_column);
                offsets.push(out.len() as u32);
                counts.push(chunk.len() as u32);
                out.extend_from_slice(&chunk);
            }
        }
        if out.len() % 2 == 1 {
            out.push(0);
        }

        let ifd_offset = out.len() as u64;
        let mut ifd_offset_bytes = Vec::new();
        self.put(&mut ifd_offset_bytes, ifd_offset, 4);
        out[4..8].copy_from_slice(&ifd_offset_bytes);

        // (tag, type, values)
        let mut entries: Vec<(u16, u16, Vec<u32>)> = vec![
            (256, 4, vec![self.width]),
            (257, 4, vec![self.height]),
            (
                258,
                3,
                vec![u32::from(self.format.bits()); usize::from(self.samples_per_pixel)],
            ),
            (259, 3, vec![if self.deflate { 8 } else { 1 }]),
            (262, 3, vec![if self.samples_per_pixel == 3 { 2 } else { 1 }]),
            (277, 3, vec![u32::from(self.samples_per_pixel)]),
            (284, 3, vec![1]),
            (339, 3, vec![u32::from(self.format.code())]),
        ];
        if self.predictor {
            entries.push((317, 3, vec![2]));
        }
        match self.layout {
            Layout::Strips { .. } => {
                entries.push((273, 4, offsets));
                entries.push((278, 4, vec![chunk_height]));
                entries.push((279, 4, counts));
            }
            Layout::Tiles { .. } => {
                entries.push((322, 3, vec![chunk_width]));
                entries.push((323, 3, vec![chunk_height]));
                entries.push((324, 4, offsets));
                entries.push((325, 4, counts));
            }
        }
        entries.sort_by_key(|(tag, _, _)| *tag);

        let mut overflow_offset = ifd_offset as usize + 2 + entries.len() * 12 + 4;
        let mut overflow = Vec::new();
        self.put(&mut out, entries.len() as u64, 2);
        for (tag, field_type, values) in &entries {
            let size = if *field_type == 3 { 2 } else { 4 };
            self.put(&mut out, u64::from(*tag), 2);
            self.put(&mut out, u64::from(*field_type), 2);
            self.put(&mut out, values.len() as u64, 4);
            if values.len() * size <= 4 {
                let mut inline = Vec::new();
                for value in values {
                    self.put(&mut inline, u64::from(*value), size);
                }
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                self.put(&mut out, overflow_offset as u64, 4);
                for value in values {
                    self.put(&mut overflow, u64::from(*value), size);
                }
                overflow_offset = ifd_offset as usize + 2 + entries.len() * 12 + 4 + overflow.len();
            }
        }
        self.put(&mut out, 0, 4);
        out.extend_from_slice(&overflow);
        out
    }

    fn raster(&self) -> GeoTiffRaster {
        GeoTiffRaster::from_bytes(self.encode()).expect("fixture parses")
    }
}

fn hills(row: u32, column: u32) -> f64 {
    f64::from(row * 7 + column * 3)
}

fn signed_hills(row: u32, column: u32) -> f64 {
    f64::from(row as i32 * 11 - column as i32 * 13)
}

fn fractional_hills(row: u32, column: u32) -> f64 {
    f64::from(row) * 1.25 + f64::from(column) * 0.5 - 3.75
}

fn assert_window_matches(raster: &GeoTiffRaster, window: ElevationWindow, elevation: fn(u32, u32) -> f64) {
    let samples = raster.read_window(window).expect("window fits");
    assert_eq!(samples.dimensions(), window.dimensions());
    for cell in window.dimensions().cells() {
        let expected = elevation(window.top() + cell.row(), window.left() + cell.column());
        assert_eq!(
            samples.sample(cell),
            Some(expected),
            "sample at window cell ({}, {})",
            cell.row(),
            cell.column()
        );
    }
}

#[test]
fn reads_a_window_from_uncompressed_strips() {
    let mut fixture = TiffFixture::new(20, 12, Format::U8, hills);
    fixture.layout = Layout::Strips { rows_per_strip: 5 };
    let raster = fixture.raster();

    assert_eq!(raster.extent(), GridDimensions::new(20, 12));
    let window = ElevationWindow::new(3, 2, 10, 9).expect("valid window");
    assert_window_matches(&raster, window, hills);
}

#[test]
fn reads_big_endian_deflate_tiles_across_tile_edges() {
    let mut fixture = TiffFixture::new(40, 24, Format::I16, signed_hills);
    fixture.order = Order::Big;
    fixture.layout = Layout::Tiles {
        width: 16,
        height: 16,
    };
    fixture.deflate = true;
    let raster = fixture.raster();

    let window = ElevationWindow::new(10, 5, 28, 19).expect("valid window");
    assert_window_matches(&raster, window, signed_hills);
}

#[test]
fn reverses_the_horizontal_predictor() {
    let mut fixture = TiffFixture::new(17, 10, Format::U16, hills);
    fixture.layout = Layout::Strips { rows_per_strip: 3 };
    fixture.deflate = true;
    fixture.predictor = true;
    let raster = fixture.raster();

    let window = ElevationWindow::new(0, 0, 17, 10).expect("valid window");
    assert_window_matches(&raster, window, hills);
}

#[test]
fn reads_floating_point_and_wide_integer_samples() {
    let mut floats = TiffFixture::new(9, 9, Format::F32, fractional_hills);
    floats.layout = Layout::Tiles {
        width: 16,
        height: 16,
    };
    let window = ElevationWindow::new(2, 2, 6, 6).expect("valid window");
    assert_window_matches(&floats.raster(), window, fractional_hills);

    let mut doubles = TiffFixture::new(9, 9, Format::F64, fractional_hills);
    doubles.order = Order::Big;
    assert_window_matches(&doubles.raster(), window, fractional_hills);

    let wide = TiffFixture::new(9, 9, Format::I32, signed_hills);
    assert_window_matches(&wide.raster(), window, signed_hills);
}

#[test]
fn uses_the_first_sample_of_chunky_pixels() {
    let mut fixture = TiffFixture::new(8, 6, Format::U8, hills);
    fixture.samples_per_pixel = 3;
    fixture.predictor = true;
    let window = ElevationWindow::new(1, 1, 6, 4).expect("valid window");
    assert_window_matches(&fixture.raster(), window, hills);
}

#[test]
fn windows_past_the_edge_are_rejected() {
    let raster = TiffFixture::new(20, 12, Format::U8, hills).raster();
    let window = ElevationWindow::new(15, 0, 10, 5).expect("valid window");
    assert_eq!(
        raster.read_window(window),
        Err(RasterError::WindowOutOfBounds {
            window,
            extent: GridDimensions::new(20, 12),
        })
    );
}

#[test]
fn truncated_files_are_malformed() {
    let mut bytes = TiffFixture::new(20, 12, Format::U8, hills).encode();
    bytes.truncate(bytes.len() / 2);
    assert!(matches!(
        GeoTiffRaster::from_bytes(bytes),
        Err(RasterError::MalformedRaster(_))
    ));

    assert!(matches!(
        GeoTiffRaster::from_bytes(b"GIF89a\0\0".to_vec()),
        Err(RasterError::MalformedRaster(_))
    ));
}

#[test]
fn corrupt_chunks_fail_the_window_read() {
    let mut fixture = TiffFixture::new(20, 12, Format::U8, hills);
    fixture.layout = Layout::Strips { rows_per_strip: 4 };
    fixture.deflate = true;
    let mut bytes = fixture.encode();
    // The first strip starts right after the 8-byte header.
    bytes[8..12].copy_from_slice(&[0xff; 4]);
    let raster = GeoTiffRaster::from_bytes(bytes).expect("layout parses");

    let window = ElevationWindow::new(0, 0, 20, 2).expect("valid window");
    assert!(matches!(
        raster.read_window(window),
        Err(RasterError::MalformedRaster(_))
    ));
    let untouched = ElevationWindow::new(0, 8, 20, 4).expect("valid window");
    assert_window_matches(&raster, untouched, hills);
}

#[tokio::test]
async fn opens_rasters_from_the_filesystem() {
    let path = std::env::temp_dir().join(format!("flowmap-raster-{}.tif", std::process::id()));
    let bytes = TiffFixture::new(20, 12, Format::U8, hills).encode();
    tokio::fs::write(&path, &bytes)
        .await
        .expect("temporary file is writable");

    let location = SourceLocation::parse(&format!("file://{}", path.display()));
    let raster = open(&location).await.expect("raster opens");
    let _ = tokio::fs::remove_file(&path).await;

    assert_eq!(raster.extent(), GridDimensions::new(20, 12));
    assert_eq!(raster.byte_len(), bytes.len());
}

#[tokio::test]
async fn missing_files_are_unavailable() {
    let location = SourceLocation::parse("/nonexistent/flowmap/dem.tif");
    assert!(matches!(
        open(&location).await,
        Err(RasterError::SourceUnavailable { .. })
    ));
}
