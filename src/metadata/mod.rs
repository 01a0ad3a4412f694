pub mod exif;
