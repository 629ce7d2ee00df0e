//! Image codec against real files on disk.

use std::path::Path;
use std::time::Duration;
use tryon_studio_lib::catalog::Catalog;
use tryon_studio_lib::imaging::{CodecError, ImageCodec, ImageSource};

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]))
        .save(path)
        .unwrap();
}

#[tokio::test]
async fn catalog_asset_paths_resolve_under_assets_dir() {
    let assets = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(assets.path().join("images")).unwrap();
    write_png(&assets.path().join("images").join("hoodie.png"), 4, 4);

    let codec = ImageCodec::new(assets.path(), Duration::from_secs(5));
    let image = codec.encode_reference("/images/hoodie.png").await.unwrap();

    assert_eq!(image.mime_type, "image/png");
    assert!(!image.data.is_empty());
}

#[tokio::test]
async fn data_url_references_are_decoded_inline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tee.png");
    write_png(&path, 2, 2);

    let codec = ImageCodec::new(dir.path(), Duration::from_secs(5));
    let local = codec.encode_local_file(&path).await.unwrap();
    let inline = codec.encode_reference(&local.to_data_url()).await.unwrap();

    assert_eq!(inline, local);
}

#[tokio::test]
async fn missing_asset_is_a_read_error() {
    let assets = tempfile::tempdir().unwrap();
    let codec = ImageCodec::new(assets.path(), Duration::from_secs(5));

    let err = codec
        .encode_reference("/images/does-not-exist.png")
        .await
        .unwrap_err();
    assert!(err.is_read_error());
}

#[tokio::test]
async fn unreachable_reference_is_a_fetch_error() {
    let codec = ImageCodec::new("assets", Duration::from_secs(5));

    let err = codec
        .encode_reference("http://127.0.0.1:9/hoodie.png")
        .await
        .unwrap_err();
    assert!(err.is_fetch_error(), "unexpected error: {}", err);
}

#[tokio::test]
async fn text_file_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.jpg");
    std::fs::write(&path, "definitely not a jpeg").unwrap();

    let codec = ImageCodec::new(dir.path(), Duration::from_secs(5));
    let err = codec.encode_local_file(&path).await.unwrap_err();
    assert!(matches!(err, CodecError::Decode { .. }), "unexpected error: {}", err);
}

#[tokio::test]
async fn builtin_catalog_images_are_shipped() {
    let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets");
    let codec = ImageCodec::new(assets, Duration::from_secs(5));

    for product in Catalog::builtin().products() {
        let image = codec.encode_reference(&product.image_url).await;
        assert!(image.is_ok(), "{}: {:?}", product.id, image.err());
    }
}
