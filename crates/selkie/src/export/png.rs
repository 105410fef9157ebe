use super::{ExportArtifact, PNG_MIME, export_filename};
use crate::config::PreviewOptions;
use crate::error::{ExportError, ExportResult};
use crate::image::VectorImage;

/// Rasterizes the image to a PNG sized for legibility: small diagrams are upscaled hard, large
/// ones gently, so exports stay sharp without ballooning.
pub fn export_png(image: &VectorImage, options: &PreviewOptions) -> ExportResult<ExportArtifact> {
    let mut opt = usvg::Options::default();
    // Best-effort text rendering; the scale policy matters more than exact glyph metrics here.
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "Arial".to_string();

    let tree = usvg::Tree::from_str(image.svg(), &opt).map_err(|_| ExportError::SvgParse)?;
    let (geo, translate_min_to_origin) = raster_geometry(image, &tree, options);

    let scale = export_scale(geo.width, geo.height);
    let (width_px, height_px) = surface_size(geo.width, geo.height, scale);
    let mut pixmap =
        tiny_skia::Pixmap::new(width_px, height_px).ok_or(ExportError::PixmapAlloc)?;

    let scale = scale as f32;
    let transform = if translate_min_to_origin {
        // Shift content so its min corner lands at the surface origin; only needed when the
        // dimensions came from content bounds rather than a viewBox.
        tiny_skia::Transform::from_row(
            scale,
            0.0,
            0.0,
            scale,
            -(geo.min_x as f32) * scale,
            -(geo.min_y as f32) * scale,
        )
    } else {
        tiny_skia::Transform::from_scale(scale, scale)
    };
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let bytes = pixmap.encode_png().map_err(|_| ExportError::PngEncode)?;
    Ok(ExportArtifact {
        filename: export_filename("png"),
        mime: PNG_MIME,
        bytes,
    })
}

#[derive(Debug, Clone, Copy)]
struct RasterGeometry {
    min_x: f64,
    min_y: f64,
    width: f64,
    height: f64,
}

/// Resolves the raster dimensions, in priority order: the viewBox, the rendered content bounds,
/// the intrinsic width/height attributes or the document's natural size, and finally the
/// configured fallback surface.
fn raster_geometry(
    image: &VectorImage,
    tree: &usvg::Tree,
    options: &PreviewOptions,
) -> (RasterGeometry, bool) {
    if let Some(vb) = image.view_box() {
        if vb.width > 0.0 && vb.height > 0.0 {
            // The viewBox transform (including its min corner) is already applied by the
            // rasterizer; translating again would shift content out of the surface.
            return (
                RasterGeometry {
                    min_x: 0.0,
                    min_y: 0.0,
                    width: vb.width,
                    height: vb.height,
                },
                false,
            );
        }
    }

    let bbox = tree.root().abs_stroke_bounding_box();
    let (width, height) = (f64::from(bbox.width()), f64::from(bbox.height()));
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        return (
            RasterGeometry {
                min_x: f64::from(bbox.x()),
                min_y: f64::from(bbox.y()),
                width,
                height,
            },
            true,
        );
    }

    if let (Some(width), Some(height)) = image.intrinsic_size() {
        if width > 0.0 && height > 0.0 {
            return (
                RasterGeometry {
                    min_x: 0.0,
                    min_y: 0.0,
                    width,
                    height,
                },
                false,
            );
        }
    }

    let size = tree.size();
    let (width, height) = (f64::from(size.width()), f64::from(size.height()));
    if width > 0.0 && height > 0.0 {
        return (
            RasterGeometry {
                min_x: 0.0,
                min_y: 0.0,
                width,
                height,
            },
            false,
        );
    }

    (
        RasterGeometry {
            min_x: 0.0,
            min_y: 0.0,
            width: options.fallback_width,
            height: options.fallback_height,
        },
        false,
    )
}

/// Upscaling factor keyed on the longer side: big diagrams get 1.5x, medium 2x, small 3x.
fn export_scale(width: f64, height: f64) -> f64 {
    let longer = width.max(height);
    if longer >= 1600.0 {
        1.5
    } else if longer >= 1000.0 {
        2.0
    } else {
        3.0
    }
}

fn surface_size(width: f64, height: f64, scale: f64) -> (u32, u32) {
    let w = (width * scale).ceil().max(1.0) as u32;
    let h = (height * scale).ceil().max(1.0) as u32;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DiagramKind;
    use crate::normalize::normalize_svg;

    #[test]
    fn scale_policy_matches_the_size_bands() {
        assert_eq!(export_scale(500.0, 300.0), 3.0);
        assert_eq!(export_scale(999.0, 999.0), 3.0);
        assert_eq!(export_scale(1000.0, 20.0), 2.0);
        assert_eq!(export_scale(20.0, 1599.0), 2.0);
        assert_eq!(export_scale(2000.0, 500.0), 1.5);
    }

    #[test]
    fn surface_dimensions_for_the_reference_view_boxes() {
        // 500x300: longer side under 1000 -> 3x.
        let scale = export_scale(500.0, 300.0);
        assert_eq!(surface_size(500.0, 300.0, scale), (1500, 900));

        // 2000x500: longer side at least 1600 -> 1.5x.
        let scale = export_scale(2000.0, 500.0);
        assert_eq!(surface_size(2000.0, 500.0, scale), (3000, 750));
    }

    #[test]
    fn rasterizes_a_small_image_to_png_bytes() {
        let image = normalize_svg(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 40 20"><rect x="0" y="0" width="40" height="20" fill="#333"/></svg>"##,
            DiagramKind::Graphviz,
        )
        .expect("normalize");

        let artifact = export_png(&image, &PreviewOptions::default()).expect("png");
        assert_eq!(artifact.mime, PNG_MIME);
        assert!(artifact.filename.ends_with(".png"));
        assert!(artifact.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }
}
