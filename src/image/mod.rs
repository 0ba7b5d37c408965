//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Image data structure, I/O and basic operations.
//!

#[macro_use]
mod utils; // must be first due to exported macros

pub mod point;

pub use point::{Point, Rect};
use std::path::Path;


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileType {
    /// Determined automatically from file name extension
    Auto,
    Bmp,
    Png,
    Tiff
}

fn file_type_from_ext(file_name: &str) -> Result<FileType, ImageError> {
    match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => match ext.to_lowercase().as_str() {
            "bmp" => Ok(FileType::Bmp),
            "png" => Ok(FileType::Png),
            "tif" | "tiff" => Ok(FileType::Tiff),
            _ => Err(ImageError::UnrecognizedExtension(file_name.to_string()))
        },
        None => Err(ImageError::UnrecognizedExtension(file_name.to_string()))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Mono8,
    /// Channel order: R, G, B.
    RGB8,
    /// Channel order: R, G, B.
    RGB16,
    Mono64f
}

pub fn num_channels(pix_fmt: PixelFormat) -> usize {
    match pix_fmt {
        PixelFormat::Mono8 | PixelFormat::Mono64f => 1,
        PixelFormat::RGB8 | PixelFormat::RGB16 => 3
    }
}

/// Pixel storage; the variant always matches the image's pixel format.
#[derive(Clone)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F64(Vec<f64>)
}

impl PixelData {
    fn zeroed(pix_fmt: PixelFormat, len: usize) -> PixelData {
        match pix_fmt {
            PixelFormat::Mono8 | PixelFormat::RGB8 => PixelData::U8(vec![0; len]),
            PixelFormat::RGB16 => PixelData::U16(vec![0; len]),
            PixelFormat::Mono64f => PixelData::F64(vec![0.0; len])
        }
    }
}

/// Type of a single channel value; ties `Image::pixels::<T>()` to the storage variant.
pub trait PixelValue: Copy + Default + 'static {
    fn matches(pix_fmt: PixelFormat) -> bool;
    fn wrap(values: Vec<Self>) -> PixelData;
    fn values(data: &PixelData) -> Option<&[Self]>;
    fn values_mut(data: &mut PixelData) -> Option<&mut [Self]>;
}

macro_rules! impl_pixel_value {
    ($T:ty, $variant:ident, $($fmt:ident),+) => {
        impl PixelValue for $T {
            fn matches(pix_fmt: PixelFormat) -> bool {
                match pix_fmt { $(PixelFormat::$fmt)|+ => true, _ => false }
            }

            fn wrap(values: Vec<Self>) -> PixelData { PixelData::$variant(values) }

            fn values(data: &PixelData) -> Option<&[Self]> {
                match data { PixelData::$variant(v) => Some(&v[..]), _ => None }
            }

            fn values_mut(data: &mut PixelData) -> Option<&mut [Self]> {
                match data { PixelData::$variant(v) => Some(&mut v[..]), _ => None }
            }
        }
    }
}

impl_pixel_value!(u8, U8, Mono8, RGB8);
impl_pixel_value!(u16, U16, RGB16);
impl_pixel_value!(f64, F64, Mono64f);

#[derive(Debug)]
pub enum ImageError {
    UnrecognizedExtension(String),
    UnsupportedPixelFormat(PixelFormat),
    Codec(image::ImageError)
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::UnrecognizedExtension(file_name) => write!(f, "unrecognized file extension: {}", file_name),
            ImageError::UnsupportedPixelFormat(pix_fmt) => write!(f, "unsupported pixel format: {:?}", pix_fmt),
            ImageError::Codec(err) => write!(f, "{}", err)
        }
    }
}

impl std::error::Error for ImageError {}

impl From<image::ImageError> for ImageError {
    fn from(err: image::ImageError) -> ImageError { ImageError::Codec(err) }
}

#[derive(Clone)]
pub struct Image {
    width: u32,
    height: u32,
    pix_fmt: PixelFormat,
    pixels: PixelData
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image {}x{}, {:?}", self.width, self.height, self.pix_fmt)
    }
}

impl Image {
    /// Creates a new zero-filled image.
    pub fn new(width: u32, height: u32, pix_fmt: PixelFormat) -> Image {
        let len = width as usize * height as usize * num_channels(pix_fmt);
        Image{ width, height, pix_fmt, pixels: PixelData::zeroed(pix_fmt, len) }
    }

    /// Creates a new image using the specified storage.
    ///
    /// `T` must correspond to `pix_fmt` and `pixels` must hold exactly one value per channel per pixel.
    ///
    pub fn new_from_pixels<T: PixelValue>(width: u32, height: u32, pix_fmt: PixelFormat, pixels: Vec<T>) -> Image {
        assert!(T::matches(pix_fmt));
        assert_eq!(width as usize * height as usize * num_channels(pix_fmt), pixels.len());

        Image{ width, height, pix_fmt, pixels: T::wrap(pixels) }
    }

    /// Loads an image as `RGB8`; files with more bits per channel are reduced to 8 bits.
    pub fn load(file_name: &str) -> Result<Image, ImageError> {
        let rgb = image::open(file_name)?.into_rgb8();
        let (width, height) = rgb.dimensions();

        Ok(Image::new_from_pixels(width, height, PixelFormat::RGB8, rgb.into_raw()))
    }

    /// Overwrites existing file. Only 8-bit formats can be saved.
    pub fn save(&self, file_name: &str, file_type: FileType) -> Result<(), ImageError> {
        let ftype = if file_type == FileType::Auto { file_type_from_ext(file_name)? } else { file_type };
        let format = match ftype {
            FileType::Bmp => image::ImageFormat::Bmp,
            FileType::Png => image::ImageFormat::Png,
            FileType::Tiff => image::ImageFormat::Tiff,
            FileType::Auto => unreachable!()
        };
        let color = match self.pix_fmt {
            PixelFormat::Mono8 => image::ColorType::L8,
            PixelFormat::RGB8 => image::ColorType::Rgb8,
            other => return Err(ImageError::UnsupportedPixelFormat(other))
        };

        image::save_buffer_with_format(file_name, self.pixels::<u8>(), self.width, self.height, color, format)?;

        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pix_fmt
    }

    pub fn img_rect(&self) -> Rect {
        Rect{ x: 0, y: 0, width: self.width, height: self.height }
    }

    /// Returns channel values per line.
    pub fn values_per_line(&self) -> usize {
        self.width as usize * num_channels(self.pix_fmt)
    }

    /// Returns all pixels.
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn pixels<T: PixelValue>(&self) -> &[T] {
        T::values(&self.pixels)
            .unwrap_or_else(|| panic!("pixel type does not match format {:?}", self.pix_fmt))
    }

    /// Returns all pixels (mutable).
    ///
    /// `T` must correspond to the image's pixel format.
    ///
    pub fn pixels_mut<T: PixelValue>(&mut self) -> &mut [T] {
        let pix_fmt = self.pix_fmt;
        T::values_mut(&mut self.pixels)
            .unwrap_or_else(|| panic!("pixel type does not match format {:?}", pix_fmt))
    }

    /// Returns image line.
    pub fn line<T: PixelValue>(&self, y: u32) -> &[T] {
        assert!(y < self.height);
        let vals_per_line = self.values_per_line();

        &self.pixels::<T>()[range!(y as usize * vals_per_line, vals_per_line)]
    }

    /// Returns mutable image line.
    pub fn line_mut<T: PixelValue>(&mut self, y: u32) -> &mut [T] {
        assert!(y < self.height);
        let vals_per_line = self.values_per_line();

        &mut self.pixels_mut::<T>()[range!(y as usize * vals_per_line, vals_per_line)]
    }

    /// Returns the value of the specified channel at (x, y) as `f64`.
    pub fn value(&self, x: u32, y: u32, channel: usize) -> f64 {
        let nch = num_channels(self.pix_fmt);
        assert!(channel < nch);
        let idx = (y as usize * self.width as usize + x as usize) * nch + channel;
        match &self.pixels {
            PixelData::U8(v) => v[idx] as f64,
            PixelData::U16(v) => v[idx] as f64,
            PixelData::F64(v) => v[idx]
        }
    }

    /// Returns a `Mono64f` image containing the values of one channel of an RGB image.
    pub fn extract_channel(&self, channel: usize) -> Image {
        assert!(channel < num_channels(self.pix_fmt));

        let nch = num_channels(self.pix_fmt);
        let values: Vec<f64> = match &self.pixels {
            PixelData::U8(v) => v.iter().skip(channel).step_by(nch).map(|&p| p as f64).collect(),
            PixelData::U16(v) => v.iter().skip(channel).step_by(nch).map(|&p| p as f64).collect(),
            PixelData::F64(v) => v.iter().skip(channel).step_by(nch).copied().collect()
        };

        Image::new_from_pixels(self.width, self.height, PixelFormat::Mono64f, values)
    }

    /// Returns a copy of image's fragment, or `None` if `rect` does not lie entirely within the image.
    pub fn fragment(&self, rect: &Rect) -> Option<Image> {
        if !self.img_rect().contains_rect(rect) {
            return None;
        }

        let mut dest_img = Image::new(rect.width, rect.height, self.pix_fmt);
        self.copy_into(&mut dest_img, rect.get_pos(), Point::zero(), rect.width, rect.height);

        Some(dest_img)
    }

    /// Pastes the whole image into `dest_img` at `dest_pos`; parts falling outside `dest_img` are skipped.
    ///
    /// Pixel formats of source and destination must be the same.
    ///
    pub fn paste_into(&self, dest_img: &mut Image, dest_pos: Point) {
        self.copy_into(dest_img, Point::zero(), dest_pos, self.width, self.height);
    }

    /// Copies (with cropping) a fragment of image to another. There is no scaling.
    ///
    /// The fragment is `width`x`height` pixels and starts at `src_pos` in `&self` and at `dest_pos`
    /// in `dest_img`. Pixel formats of source and destination must be the same.
    ///
    fn copy_into(&self, dest_img: &mut Image, src_pos: Point, dest_pos: Point, width: u32, height: u32) {
        assert!(self.pix_fmt == dest_img.pix_fmt);

        // Cropping: shift both start points so that neither precedes its image origin
        let shift_x = 0.max(-src_pos.x).max(-dest_pos.x);
        let shift_y = 0.max(-src_pos.y).max(-dest_pos.y);
        let src_start = Point{ x: src_pos.x + shift_x, y: src_pos.y + shift_y };
        let dest_start = Point{ x: dest_pos.x + shift_x, y: dest_pos.y + shift_y };

        let copy_w = (width as i32 - shift_x)
            .min(self.width as i32 - src_start.x)
            .min(dest_img.width as i32 - dest_start.x);
        let copy_h = (height as i32 - shift_y)
            .min(self.height as i32 - src_start.y)
            .min(dest_img.height as i32 - dest_start.y);

        if copy_w <= 0 || copy_h <= 0 {
            return;
        }

        let nch = num_channels(self.pix_fmt);
        let line_len = copy_w as usize * nch;
        for dy in 0..copy_h {
            let src_ofs = src_start.x as usize * nch;
            let dest_ofs = dest_start.x as usize * nch;
            let src_y = (src_start.y + dy) as u32;
            let dest_y = (dest_start.y + dy) as u32;

            match self.pix_fmt {
                PixelFormat::Mono8 | PixelFormat::RGB8 => dest_img.line_mut::<u8>(dest_y)[range!(dest_ofs, line_len)]
                    .copy_from_slice(&self.line::<u8>(src_y)[range!(src_ofs, line_len)]),

                PixelFormat::RGB16 => dest_img.line_mut::<u16>(dest_y)[range!(dest_ofs, line_len)]
                    .copy_from_slice(&self.line::<u16>(src_y)[range!(src_ofs, line_len)]),

                PixelFormat::Mono64f => dest_img.line_mut::<f64>(dest_y)[range!(dest_ofs, line_len)]
                    .copy_from_slice(&self.line::<f64>(src_y)[range!(src_ofs, line_len)])
            }
        }
    }

    /// Converts a `Mono64f` image to `Mono8`, mapping the range of finite values linearly to 0-255.
    pub fn to_mono8_normalized(&self) -> Image {
        assert!(self.pix_fmt == PixelFormat::Mono64f);

        let values = self.pixels::<f64>();
        let (lo, hi) = utils::finite_min_max(values).unwrap_or((0.0, 0.0));
        let converted: Vec<u8> = values.iter().map(|&v| utils::scale_to_u8(v, lo, hi)).collect();

        Image::new_from_pixels(self.width, self.height, PixelFormat::Mono8, converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> Image {
        let values: Vec<f64> = (0..width * height).map(|i| i as f64).collect();
        Image::new_from_pixels(width, height, PixelFormat::Mono64f, values)
    }

    #[test]
    fn given_rgb_image_extract_channel() {
        let img = Image::new_from_pixels(2, 1, PixelFormat::RGB8, vec![1u8, 2, 3, 4, 5, 6]);
        assert_eq!(&[1.0, 4.0], img.extract_channel(0).pixels::<f64>());
        assert_eq!(&[2.0, 5.0], img.extract_channel(1).pixels::<f64>());
        assert_eq!(&[3.0, 6.0], img.extract_channel(2).pixels::<f64>());
        assert_eq!(6.0, img.value(1, 0, 2));
    }

    #[test]
    fn when_fragment_inside_copy() {
        let img = ramp(5, 4);
        let frag = img.fragment(&Rect::new(1, 2, 3, 2)).unwrap();
        assert_eq!(3, frag.width());
        assert_eq!(2, frag.height());
        assert_eq!(&[11.0, 12.0, 13.0, 16.0, 17.0, 18.0], frag.pixels::<f64>());
    }

    #[test]
    fn when_fragment_outside_fail() {
        let img = ramp(5, 4);
        assert!(img.fragment(&Rect::new(3, 0, 3, 2)).is_none());
        assert!(img.fragment(&Rect::new(-1, 0, 3, 2)).is_none());
    }

    #[test]
    fn when_pasting_over_edge_crop() {
        let src = ramp(2, 2);
        let mut dest = Image::new(3, 3, PixelFormat::Mono64f);
        src.paste_into(&mut dest, Point::new(2, -1));
        assert_eq!(&[0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], dest.pixels::<f64>());

        let mut dest = Image::new(3, 3, PixelFormat::Mono64f);
        src.paste_into(&mut dest, Point::new(1, 1));
        assert_eq!(&[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 3.0], dest.pixels::<f64>());
    }

    #[test]
    fn given_float_image_normalize_to_8_bits() {
        let img = Image::new_from_pixels(3, 1, PixelFormat::Mono64f, vec![100.0, 300.0, 200.0]);
        let converted = img.to_mono8_normalized();
        assert_eq!(PixelFormat::Mono8, converted.pixel_format());
        assert_eq!(&[0u8, 255, 128], converted.pixels::<u8>());
    }

    #[test]
    #[should_panic]
    fn when_pixel_type_mismatched_panic() {
        let img = Image::new(2, 2, PixelFormat::RGB8);
        let _ = img.pixels::<f64>();
    }

    #[test]
    fn given_16_bit_tiff_load_as_8_bits() {
        let file_name = std::env::temp_dir().join(format!("ringfit-load16-{}.tif", std::process::id()));
        let mut values = vec![0u16; 4 * 2 * 3];
        values[2] = 65535; // blue of (0, 0)
        values[3] = 25700; // red of (1, 0)
        image::ImageBuffer::<image::Rgb<u16>, Vec<u16>>::from_raw(4, 2, values).unwrap()
            .save_with_format(&file_name, image::ImageFormat::Tiff).unwrap();

        let img = Image::load(file_name.to_str().unwrap()).unwrap();
        std::fs::remove_file(&file_name).unwrap();

        assert_eq!(PixelFormat::RGB8, img.pixel_format());
        assert_eq!((4, 2), (img.width(), img.height()));
        assert_eq!(&[0u8, 0, 255], &img.line::<u8>(0)[0..3]);
        assert_eq!(100.0, img.value(1, 0, 0));
    }

    #[test]
    fn when_extension_unknown_fail() {
        assert!(file_type_from_ext("montage.jpg2").is_err());
        assert_eq!(FileType::Tiff, file_type_from_ext("cell_01.TIF").unwrap());
    }
}
