use kurbo::{Point, Rect, Size, Vec2};
use largeview::tiles::sample_level_for;
use largeview::viewport::{Anchor, ScaleLimits, ScaleType, ViewportTransform};

const EPS: f64 = 1e-9;

/// Small deterministic generator so property runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

fn viewport(view: (f64, f64), content: (f64, f64)) -> ViewportTransform {
    let mut vp = ViewportTransform::new(ScaleLimits::default());
    vp.set_bounds(Rect::new(0.0, 0.0, view.0, view.1));
    vp.set_content_size(Size::new(content.0, content.1));
    vp
}

fn assert_axis_valid(offset: f64, view: f64, displayed: f64) {
    if displayed > view {
        assert!(
            offset <= EPS && offset >= view - displayed - EPS,
            "offset {offset} leaves a gap (view {view}, displayed {displayed})"
        );
    } else {
        assert!(
            (offset - (view - displayed) / 2.0).abs() < 1e-6,
            "offset {offset} not centered (view {view}, displayed {displayed})"
        );
    }
}

fn assert_layout_valid(vp: &ViewportTransform) {
    let scale = vp.scale();
    assert!(scale >= vp.min_scale() - EPS && scale <= vp.max_scale() + EPS);
    let content = vp.content_size();
    let bounds = vp.bounds();
    assert_axis_valid(vp.offset().x, bounds.width(), content.width * scale);
    assert_axis_valid(vp.offset().y, bounds.height(), content.height * scale);
}

#[test]
fn random_gestures_keep_layout_valid() {
    let mut rng = Lcg(7);
    for round in 0..20 {
        let view = (rng.range(100.0, 1600.0), rng.range(100.0, 1200.0));
        let content = (rng.range(50.0, 20000.0), rng.range(50.0, 20000.0));
        let mut vp = viewport(view, content);
        vp.set_anchor(Anchor::ALL[round % Anchor::ALL.len()]);
        vp.set_scale_type(ScaleType::ALL[round % ScaleType::ALL.len()]);
        assert_layout_valid(&vp);

        for _ in 0..200 {
            if rng.next_f64() < 0.5 {
                vp.scroll(rng.range(-800.0, 800.0), rng.range(-800.0, 800.0));
            } else {
                let focal = Point::new(rng.range(0.0, view.0), rng.range(0.0, view.1));
                vp.scale_at(focal, rng.range(0.3, 3.0));
            }
            assert_layout_valid(&vp);
        }
    }
}

#[test]
fn unclamped_scroll_round_trips() {
    let mut vp = viewport((800.0, 600.0), (4000.0, 3000.0));
    vp.set_scale(1.0);
    vp.scroll(-1000.0, -1000.0);
    let start = vp.offset();

    let rest = vp.scroll(-150.0, 75.0);
    assert_eq!(rest, Vec2::ZERO);
    let rest = vp.scroll(150.0, -75.0);
    assert_eq!(rest, Vec2::ZERO);
    assert!((vp.offset() - start).hypot() < EPS);
}

#[test]
fn scroll_reports_clamped_remainder() {
    let mut vp = viewport((800.0, 600.0), (1600.0, 1200.0));
    vp.set_scale(1.0);
    assert_eq!(vp.offset(), Vec2::ZERO);

    let rest = vp.scroll(50.0, -100.0);
    assert!((rest.x - 50.0).abs() < EPS);
    assert!(rest.y.abs() < EPS);
    assert!((vp.offset().y + 100.0).abs() < EPS);
}

#[test]
fn focal_point_stays_fixed_while_zooming() {
    let mut vp = viewport((1000.0, 1000.0), (4000.0, 4000.0));
    assert!((vp.scale() - 0.25).abs() < EPS);

    let focal = Point::new(500.0, 500.0);
    let before = vp.view_to_source(focal).expect("laid out");
    let rest = vp.scale_at(focal, 2.0);
    assert!((rest - 1.0).abs() < EPS);
    let after = vp.view_to_source(focal).expect("laid out");
    assert!((before - after).hypot() < 1e-6);

    let focal = Point::new(300.0, 700.0);
    let before = vp.view_to_source(focal).expect("laid out");
    vp.scale_at(focal, 1.5);
    let after = vp.view_to_source(focal).expect("laid out");
    assert!((before - after).hypot() < 1e-6);
}

#[test]
fn zoom_past_max_returns_leftover_factor() {
    let mut vp = viewport((1000.0, 1000.0), (4000.0, 4000.0));
    assert!((vp.max_scale() - 3.0).abs() < EPS);
    vp.set_scale(2.0);

    let rest = vp.scale_at(Point::new(500.0, 500.0), 3.0);
    assert!((vp.scale() - 3.0).abs() < EPS);
    assert!((rest - 2.0).abs() < 1e-9);

    let rest = vp.scale_at(Point::new(500.0, 500.0), 2.0);
    assert_eq!(rest, 2.0);
}

#[test]
fn source_and_view_mappings_invert() {
    let mut vp = viewport((640.0, 480.0), (5000.0, 2000.0));
    vp.scale_at(Point::new(100.0, 100.0), 4.0);
    vp.scroll(-300.0, -120.0);
    let p = Point::new(123.5, 456.25);
    let back = vp
        .view_to_source(vp.source_to_view(p).expect("laid out"))
        .expect("laid out");
    assert!((back - p).hypot() < 1e-9);
}

#[test]
fn draw_rects_stay_inside_bounds_and_content() {
    let mut rng = Lcg(99);
    let mut vp = viewport((900.0, 700.0), (3000.0, 2500.0));
    vp.set_visible_rect(Rect::new(100.0, -50.0, 600.0, 500.0));
    for _ in 0..100 {
        vp.scale_at(
            Point::new(rng.range(0.0, 900.0), rng.range(0.0, 700.0)),
            rng.range(0.5, 2.0),
        );
        vp.scroll(rng.range(-400.0, 400.0), rng.range(-400.0, 400.0));

        let Some(rects) = vp.draw_rects() else {
            continue;
        };
        assert!(rects.dst.x0 >= 100.0 - EPS && rects.dst.x1 <= 600.0 + EPS);
        assert!(rects.dst.y0 >= -EPS && rects.dst.y1 <= 500.0 + EPS);
        assert!(rects.src.x0 >= -EPS && rects.src.x1 <= 3000.0 + EPS);
        assert!(rects.src.y0 >= -EPS && rects.src.y1 <= 2500.0 + EPS);
    }
}

#[test]
fn next_level_cycles_through_levels() {
    let mut vp = viewport((1000.0, 500.0), (2000.0, 2000.0));
    assert_eq!(vp.scale_levels(), &[0.25, 0.5, 1.0, 3.0]);
    assert!((vp.scale() - 0.25).abs() < EPS);

    let mut seen = Vec::new();
    for _ in 0..4 {
        let next = vp.next_scale_level();
        seen.push(next);
        vp.set_scale(next);
    }
    assert_eq!(seen, vec![0.5, 1.0, 3.0, 0.25]);
}

#[test]
fn sample_level_never_grows_with_scale() {
    let mut previous = u32::MAX;
    let mut scale = 0.001;
    while scale < 8.0 {
        let sample = sample_level_for(scale);
        assert!(sample.is_power_of_two());
        assert!(sample <= previous, "sample grew at scale {scale}");
        assert!(f64::from(sample) <= (1.0 / scale).max(1.0));
        previous = sample;
        scale *= 1.07;
    }
    assert_eq!(sample_level_for(0.3), 2);
    assert_eq!(sample_level_for(2.0), 1);
}

#[test]
fn degenerate_layout_makes_gestures_noops() {
    let mut vp = ViewportTransform::default();
    assert!(vp.is_degenerate());
    assert_eq!(vp.scroll(10.0, 20.0), Vec2::new(10.0, 20.0));
    assert_eq!(vp.scale_at(Point::ORIGIN, 2.0), 2.0);
    assert!(vp.draw_rects().is_none());

    vp.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(vp.draw_rects().is_none());
}
