//! Native GeoTIFF reading/writing through the `tiff` crate

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray64Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Sample precision of written files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    Float32,
    #[default]
    Float64,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_format: SampleFormat,
}

impl GeoTiffOptions {
    pub fn float32() -> Self {
        Self {
            sample_format: SampleFormat::Float32,
        }
    }
}

/// Read the first band of a GeoTIFF file into a `Raster<T>`.
///
/// Georeferencing comes from the pixel scale and tiepoint tags; the EPSG
/// code, if any, from the GeoKey directory; no-data from the GDAL tag.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {e}")))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {e}")))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {e}")))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ));
        }
    };

    // Multi-sample images decode interleaved; only single-band files are accepted
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Some(epsg) = read_epsg(&mut decoder) {
        raster.set_crs(Some(CRS::from_epsg(epsg)));
    }
    if let Some(nodata) = read_nodata::<T, R>(&mut decoder) {
        raster.set_nodata(Some(nodata));
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    // tiff decodes the GeoTIFF ids into named variants; `Tag::Unknown(33550)`
    // never compares equal to them
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header is 4 shorts, then entries of (key, location, count, value)
    keys[4..]
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0)
        .find(|entry| entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
        .map(|entry| entry[3] as u32)
        .filter(|&code| code != 0 && code != 32767)
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    num_traits::cast(value)
}

/// Write a raster to a single-band GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok());
    let geographic = crs.is_some_and(|c| c.is_geographic());

    let mut entries: Vec<[u16; 4]> = vec![
        // ModelTypeProjected / ModelTypeGeographic
        [GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }],
        // RasterPixelIsArea
        [GT_RASTER_TYPE_KEY, 0, 1, 1],
    ];
    if let Some(code) = code {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    let (rows, cols) = raster.shape();
    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    let keys = geokeys(raster.crs());
    let nodata = raster
        .nodata()
        .and_then(|v| v.to_f64())
        .map(|v| if v.is_nan() { "nan".to_string() } else { v.to_string() });

    macro_rules! write_image {
        ($color:ty, $sample:ty, $fallback:expr) => {{
            let data: Vec<$sample> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or($fallback))
                .collect();

            let mut image = encoder
                .new_image::<$color>(cols as u32, rows as u32)
                .map_err(|e| Error::Other(format!("Cannot create TIFF image: {e}")))?;

            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &scale[..])
                .map_err(|e| Error::Other(format!("Cannot write scale tag: {e}")))?;
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
                .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {e}")))?;
            image
                .encoder()
                .write_tag(Tag::GeoKeyDirectoryTag, keys.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write geokey tag: {e}")))?;
            if let Some(nodata) = &nodata {
                image
                    .encoder()
                    .write_tag(Tag::GdalNodata, nodata.as_str())
                    .map_err(|e| Error::Other(format!("Cannot write nodata tag: {e}")))?;
            }

            image
                .write_data(&data)
                .map_err(|e| Error::Other(format!("Cannot write image data: {e}")))?;
        }};
    }

    match options.sample_format {
        SampleFormat::Float32 => write_image!(Gray32Float, f32, f32::NAN),
        SampleFormat::Float64 => write_image!(Gray64Float, f64, f64::NAN),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster<f64> {
        let mut raster = Raster::from_vec(vec![0.1, 0.2, f64::NAN, 0.4, 0.5, 0.6], 2, 3).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 2_800_000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::utm(13, true)));
        raster.set_nodata(Some(f64::NAN));
        raster
    }

    #[test]
    fn test_buffer_preserves_georeferencing() {
        let raster = sample();
        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert!(back.transform().approx_eq(raster.transform()));
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32613));
        assert_eq!(back.get(1, 2).unwrap(), 0.6);
        assert!(back.get(0, 2).unwrap().is_nan());
    }

    #[test]
    fn test_float32_output() {
        let bytes = write_geotiff_to_buffer(&sample(), Some(GeoTiffOptions::float32())).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert!((back.get(0, 0).unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_geokeys_layout() {
        let keys = geokeys(Some(&CRS::utm(13, true)));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[12..], &[PROJECTED_CS_TYPE_KEY, 0, 1, 32613]);
    }

    #[test]
    fn test_geotiff_tags_are_found_by_name() {
        let mut raster = sample();
        raster.set_nodata(Some(-9999.0));
        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();

        let mut decoder = Decoder::new(Cursor::new(&bytes[..])).unwrap();
        assert!(decoder.find_tag(Tag::ModelPixelScaleTag).unwrap().is_some());
        assert!(decoder.find_tag(Tag::ModelTiepointTag).unwrap().is_some());
        assert!(decoder.find_tag(Tag::GeoKeyDirectoryTag).unwrap().is_some());

        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        let gt = back.transform();
        assert_eq!(gt.origin_x, 500_000.0);
        assert_eq!(gt.origin_y, 2_800_000.0);
        assert_eq!(gt.pixel_width, 30.0);
        assert_eq!(gt.pixel_height, -30.0);
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.pixel_area(), 900.0);
    }

    #[test]
    fn test_garbage_buffer_is_error() {
        assert!(read_geotiff_from_buffer::<f64>(b"not a tiff").is_err());
    }
}
