//! Property-based invariants for particle fields.
//!
//! - batch size is `floor(width * height / divisor)` after creation and
//!   after every resize
//! - wrapping variants keep every particle inside `[0, w) x [0, h)`
//! - particle opacity stays in `[0, 1]` for any seed

use std::sync::Arc;

use backdrop_common::{SurfaceSize, Viewport};
use backdrop_kernel::prelude::*;
use proptest::prelude::*;

const DT: f64 = 1.0 / 60.0;

fn dimension() -> impl Strategy<Value = f32> {
    (50u32..=1600).prop_map(|v| v as f32)
}

fn divisor() -> impl Strategy<Value = f32> {
    prop_oneof![Just(8000.0f32), Just(20000.0f32), 500.0f32..30000.0]
}

fn ratio() -> impl Strategy<Value = f32> {
    prop_oneof![Just(1.0f32), Just(1.5f32), Just(2.0f32), Just(3.0f32)]
}

fn wrapping_variant() -> impl Strategy<Value = VariantKind> {
    prop::sample::select(
        VariantKind::ALL
            .into_iter()
            .filter(VariantKind::wraps)
            .collect::<Vec<_>>(),
    )
}

fn any_variant() -> impl Strategy<Value = VariantKind> {
    prop::sample::select(VariantKind::ALL.to_vec())
}

fn spawn(
    viewport: &Watch<Viewport>,
    driver: &ManualFrameDriver,
    config: FieldConfig,
) -> ParticleField<RecordingCanvas> {
    let surface = Surface::new(viewport.clone(), RecordingCanvas::new());
    ParticleField::create(surface, config, Arc::new(driver.clone())).unwrap()
}

fn expected(width: f32, height: f32, divisor: f32) -> usize {
    (f64::from(width) * f64::from(height) / f64::from(divisor)).floor() as usize
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn count_follows_area_across_resizes(
        w0 in dimension(),
        h0 in dimension(),
        w1 in dimension(),
        h1 in dimension(),
        dpr in ratio(),
        divisor in divisor(),
    ) {
        let viewport = Watch::new(Viewport::new(w0, h0, dpr));
        let driver = ManualFrameDriver::new();
        let config = VariantKind::Embers
            .preset()
            .with_density_divisor(divisor)
            .with_seed(11);
        let field = spawn(&viewport, &driver, config);

        prop_assert_eq!(field.particle_count(), expected(w0, h0, divisor));
        driver.advance(DT);

        viewport.set(Viewport::new(w1, h1, dpr));
        prop_assert_eq!(field.particle_count(), expected(w1, h1, divisor));
        prop_assert_eq!(field.with_particles(<[Particle]>::len), field.particle_count());

        driver.advance(DT);
        prop_assert_eq!(field.particle_count(), expected(w1, h1, divisor));
        field.destroy();
    }

    #[test]
    fn wrapping_variants_stay_on_surface(
        kind in wrapping_variant(),
        width in dimension(),
        height in dimension(),
        seed in any::<u64>(),
        frames in 1usize..240,
    ) {
        let viewport = Watch::new(Viewport::new(width, height, 1.0));
        let driver = ManualFrameDriver::new();
        let field = spawn(&viewport, &driver, kind.preset().with_seed(seed));
        driver.run(frames, DT);

        let size = SurfaceSize::new(width, height);
        field.with_particles(|batch| {
            for p in batch {
                prop_assert!(
                    size.contains(p.position),
                    "{} left the surface at {:?}",
                    kind,
                    p.position
                );
            }
            Ok(())
        })?;
    }

    #[test]
    fn opacity_stays_in_unit_range(
        kind in any_variant(),
        seed in any::<u64>(),
        frames in 1usize..400,
    ) {
        let viewport = Watch::new(Viewport::new(360.0, 240.0, 1.0));
        let driver = ManualFrameDriver::new();
        let field = spawn(&viewport, &driver, kind.preset().with_seed(seed));

        for _ in 0..frames {
            driver.advance(DT);
            let in_range = field.with_particles(|batch| {
                batch.iter().all(|p| (0.0..=1.0).contains(&p.opacity))
            });
            prop_assert!(in_range, "{} produced opacity outside [0, 1]", kind);
        }
    }
}
