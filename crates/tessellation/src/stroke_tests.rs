use crate::device::{BufferId, RecordingDevice};
use crate::geom::classify::classify_cubic;
use crate::geom::CubicBezierSegment;
use crate::math::{point, Point};
use crate::path::Path;
use crate::resolve_level::{ResolveLevelCounter, SegmentPlan};
use crate::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn count_levels(strokes: &StrokeList, batching: Batching) -> ResolveLevels {
    let mut counter =
        ResolveLevelCounter::new(&Tolerances::DEFAULT, batching, strokes.verb_count());
    for (path, options) in strokes.iter() {
        counter.count_path(path, options);
    }
    counter.finish()
}

fn single_stroke(path: Path, options: StrokeOptions) -> StrokeList {
    let mut strokes = StrokeList::new();
    strokes.push(path, options);
    strokes
}

fn prepare_indirect(strokes: StrokeList, batching: Batching) -> RecordingDevice {
    let mut tessellator =
        IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, batching).unwrap();
    let mut device = RecordingDevice::new();
    tessellator.prepare(&mut device).unwrap();
    tessellator.draw(&mut device);
    device
}

fn random_point(rng: &mut StdRng) -> Point {
    point(rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0))
}

fn random_path(rng: &mut StdRng) -> Path {
    let mut builder = Path::builder();
    let num_contours = rng.gen_range(1..4);
    for _ in 0..num_contours {
        builder.begin(random_point(rng));
        let num_segments = rng.gen_range(0..8);
        for _ in 0..num_segments {
            match rng.gen_range(0..4) {
                0 => {
                    builder.line_to(random_point(rng));
                }
                1 => {
                    builder.quadratic_bezier_to(random_point(rng), random_point(rng));
                }
                2 => {
                    let weight = rng.gen_range(0.1..3.0);
                    builder.conic_to(random_point(rng), random_point(rng), weight);
                }
                _ => {
                    builder.cubic_bezier_to(
                        random_point(rng),
                        random_point(rng),
                        random_point(rng),
                    );
                }
            }
        }
        builder.end(rng.gen_bool(0.5));
    }

    builder.build()
}

fn random_options(rng: &mut StdRng) -> StrokeOptions {
    let caps = [LineCap::Butt, LineCap::Round, LineCap::Square];
    let joins = [LineJoin::Miter, LineJoin::Round, LineJoin::Bevel];
    StrokeOptions::DEFAULT
        .with_line_width(rng.gen_range(0.5..40.0))
        .with_line_cap(caps[rng.gen_range(0..caps.len())])
        .with_line_join(joins[rng.gen_range(0..joins.len())])
}

fn random_strokes(seed: u64, count: usize) -> StrokeList {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut strokes = StrokeList::new();
    for _ in 0..count {
        let path = random_path(&mut rng);
        let options = random_options(&mut rng);
        strokes.push(path, options);
    }
    strokes
}

fn chop_bits(levels: &ResolveLevels) -> Vec<u32> {
    levels.chop_ts.iter().map(|t| t.to_bits()).collect()
}

fn buffer_contents(device: &RecordingDevice) -> Vec<Vec<u8>> {
    (0..device.buffer_count())
        .map(|i| device.buffer_bytes(BufferId(i as u32)).to_vec())
        .collect()
}

#[test]
fn resolve_levels_grow_with_width_and_length() {
    let arch = |scale: f32| {
        let mut builder = Path::builder();
        builder.begin(point(0.0, 0.0));
        builder.cubic_bezier_to(
            point(10.0 * scale, 20.0 * scale),
            point(20.0 * scale, 20.0 * scale),
            point(30.0 * scale, 0.0),
        );
        builder.end(false);
        builder.build()
    };
    let level_of = |path: Path, width: f32| {
        let strokes = single_stroke(path, StrokeOptions::DEFAULT.with_line_width(width));
        match count_levels(&strokes, Batching::Scalar).plan[0] {
            SegmentPlan::Direct(level) => level,
            other => panic!("unexpected plan {:?}", other),
        }
    };

    let mut prev = 0;
    for width in &[0.5, 1.0, 2.0, 8.0, 32.0, 128.0, 1024.0] {
        let level = level_of(arch(1.0), *width);
        assert!(level >= prev, "width {}: {} < {}", width, level, prev);
        prev = level;
    }

    let mut prev = 0;
    for scale in &[0.1, 1.0, 4.0, 16.0, 256.0, 4096.0] {
        let level = level_of(arch(*scale), 1.0);
        assert!(level >= prev, "scale {}: {} < {}", scale, level, prev);
        prev = level;
    }
    assert!(prev > 0);
}

#[test]
fn resolve_levels_grow_with_rotation() {
    // Two lines of the same length with a round join that turns by `angle` between them.
    let elbow = |angle: f32| {
        let mut builder = Path::builder();
        builder.begin(point(0.0, 0.0));
        builder.line_to(point(100.0, 0.0));
        builder.line_to(point(
            100.0 + 100.0 * angle.cos(),
            100.0 * angle.sin(),
        ));
        builder.end(false);
        builder.build()
    };
    let options = StrokeOptions::DEFAULT
        .with_line_join(LineJoin::Round)
        .with_line_width(40.0);

    for &batching in &[Batching::Scalar, Batching::Lanes] {
        let mut prev = 0;
        for angle in &[0.0, 0.1, 0.3, 0.6, 1.0, 1.5, 2.0, 2.5, 3.0, 3.1] {
            let levels = count_levels(&single_stroke(elbow(*angle), options), batching);
            // The second line carries the join and comes first.
            let level = match levels.plan[0] {
                SegmentPlan::Direct(level) => level,
                other => panic!("unexpected plan {:?}", other),
            };
            assert!(levels.counts[level as usize] > 0);
            assert!(
                level >= prev,
                "{:?} angle {}: {} < {}",
                batching,
                angle,
                level,
                prev
            );
            prev = level;
        }
        assert!(prev > 0, "{:?}", batching);
    }
}

#[test]
fn batched_levels_match_scalar_levels() {
    for seed in 0..20 {
        let strokes = random_strokes(seed, 12);
        let scalar = count_levels(&strokes, Batching::Scalar);
        let lanes = count_levels(&strokes, Batching::Lanes);
        assert_eq!(scalar.counts, lanes.counts, "seed {}", seed);
        assert_eq!(scalar.plan, lanes.plan, "seed {}", seed);
        assert_eq!(chop_bits(&scalar), chop_bits(&lanes), "seed {}", seed);

        let scalar = prepare_indirect(strokes.clone(), Batching::Scalar);
        let lanes = prepare_indirect(strokes, Batching::Lanes);
        assert_eq!(buffer_contents(&scalar), buffer_contents(&lanes), "seed {}", seed);
    }
}

#[test]
fn filled_bins_match_counted_levels() {
    for seed in 100..120 {
        let strokes = random_strokes(seed, 8);
        let mut tessellator =
            IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes)
                .unwrap();
        let mut device = RecordingDevice::new();
        tessellator.prepare(&mut device).unwrap();
        tessellator.draw(&mut device);

        let instances = device.drawn_instances();
        assert_eq!(instances.len() as u32, tessellator.total_instance_count());

        let commands = device.indirect_commands(BufferId(0));
        let non_empty: Vec<u32> = tessellator
            .level_counts()
            .iter()
            .cloned()
            .filter(|count| *count != 0)
            .collect();
        let command_counts: Vec<u32> = commands.iter().map(|cmd| cmd.instance_count).collect();
        assert_eq!(command_counts, non_empty, "seed {}", seed);

        // Every instance sits in the bin drawn with its edge count.
        let all_instances = device.stroke_instances(BufferId(1));
        for cmd in &commands {
            let first = cmd.base_instance as usize;
            for instance in &all_instances[first..first + cmd.instance_count as usize] {
                assert_eq!(instance.num_edges.abs() * 2.0, cmd.vertex_count as f32);
            }
        }
    }
}

#[test]
fn preparing_twice_gives_identical_buffers() {
    let strokes = random_strokes(7, 16);

    let first = prepare_indirect(strokes.clone(), Batching::Lanes);
    let second = prepare_indirect(strokes.clone(), Batching::Lanes);
    assert_eq!(buffer_contents(&first), buffer_contents(&second));
    assert_eq!(first.draw_calls(), second.draw_calls());

    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let hardware = HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps).unwrap();
    let a = hardware.write_patches();
    let b = hardware.write_patches();
    let a_bytes: &[u8] = bytemuck::cast_slice(&a);
    let b_bytes: &[u8] = bytemuck::cast_slice(&b);
    assert_eq!(a_bytes, b_bytes);
}

#[test]
fn cusp_pieces_are_not_chopped_again() {
    let cubic = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(100.0, 100.0),
        ctrl2: point(0.0, 100.0),
        to: point(100.0, 0.0),
    };
    let classification = classify_cubic(&cubic);
    assert!(classification.chops_are_cusps);
    assert_eq!(classification.chops.len(), 1);

    let pieces = cubic.split_at(&classification.chops);
    assert_eq!(pieces.len(), 2);
    for piece in &pieces {
        let piece_classification = classify_cubic(piece);
        assert!(!piece_classification.degenerate);
        assert!(piece_classification.is_convex_180(), "{:?}", piece);
    }
}

#[test]
fn inflection_chops_have_negative_edge_counts() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.cubic_bezier_to(point(10.0, 10.0), point(20.0, -10.0), point(30.0, 0.0));
    builder.line_to(point(30.0, 30.0));
    builder.end(false);
    let device = prepare_indirect(
        single_stroke(builder.build(), StrokeOptions::DEFAULT),
        Batching::Lanes,
    );

    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 3);
    assert!(instances.iter().all(|i| !i.is_circle()));
    for instance in &instances {
        let starts_at_inflection = instance.from() == point(15.0, 0.0);
        assert_eq!(instance.is_internal_chop(), starts_at_inflection);
    }
    assert_eq!(
        instances.iter().filter(|i| i.is_internal_chop()).count(),
        1
    );
}

#[test]
fn lone_move_to_caps() {
    let lone_point = || {
        let mut builder = Path::builder();
        builder.begin(point(10.0, 10.0));
        builder.end(false);
        builder.build()
    };

    let round = prepare_indirect(
        single_stroke(lone_point(), StrokeOptions::DEFAULT.with_line_cap(LineCap::Round)),
        Batching::Lanes,
    );
    let instances = round.drawn_instances();
    assert_eq!(instances.len(), 1);
    assert!(instances[0].is_circle());
    assert_eq!(instances[0].from(), point(10.0, 10.0));

    let butt = prepare_indirect(
        single_stroke(lone_point(), StrokeOptions::DEFAULT),
        Batching::Lanes,
    );
    assert!(butt.drawn_instances().is_empty());
    assert!(butt.draw_calls().is_empty());

    let square_options = StrokeOptions::DEFAULT
        .with_line_cap(LineCap::Square)
        .with_line_width(2.0);
    let square = prepare_indirect(single_stroke(lone_point(), square_options), Batching::Lanes);
    let instances = square.drawn_instances();
    assert_eq!(instances.len(), 1);
    // A line of the stroke width, stroked with half of it on each side.
    let instance = &instances[0];
    assert_eq!(instance.points[0], [9.0, 10.0]);
    assert_eq!(instance.points[3], [11.0, 10.0]);
    assert_eq!(instance.stroke_radius, 1.0);
}

#[test]
fn closed_triangle_joins() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.close();
    let options = StrokeOptions::DEFAULT.with_line_join(LineJoin::Bevel);
    let device = prepare_indirect(single_stroke(builder.build(), options), Batching::Scalar);

    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 3);
    for instance in &instances {
        assert!(instance.num_edges > 0.0);
        assert_eq!(instance.join_type, 0.0);
        // Every edge carries the join with the edge before it.
        assert_ne!(instance.prev_control_point(), instance.from());
    }

    let first_edge = instances
        .iter()
        .find(|i| i.from() == point(0.0, 0.0))
        .unwrap();
    assert_eq!(first_edge.points[3], [10.0, 0.0]);
    // Joined with the closing edge (10, 10) -> (0, 0).
    assert_eq!(first_edge.prev_control_point(), point(10.0, 10.0));
}

#[test]
fn conic_weights_reach_both_strategies() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.conic_to(point(20.0, 0.0), point(20.0, 20.0), 0.75);
    builder.end(false);
    let path = builder.build();

    let strokes = single_stroke(path.clone(), StrokeOptions::DEFAULT);
    let device = prepare_indirect(strokes, Batching::Lanes);
    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 1);
    assert!(instances[0].is_conic());
    assert_eq!(instances[0].points[3][0], 0.75);

    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let patches = HardwareStrokeTessellator::new(
        single_stroke(path, StrokeOptions::DEFAULT),
        &Tolerances::DEFAULT,
        &caps,
    )
    .unwrap()
    .write_patches();
    let conics: Vec<_> = patches
        .iter()
        .filter(|p| p.points[3][1].is_infinite())
        .collect();
    assert_eq!(conics.len(), 1);
    assert_eq!(conics[0].patch_type, PatchType::Conic.to_f32());
    assert_eq!(conics[0].points[3][0], 0.75);
}

#[test]
fn both_strategies_draw_chained_batches() {
    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(32);
    let mut device = RecordingDevice::new();

    let mut indirect = IndirectStrokeTessellator::new(
        random_strokes(1, 4),
        &Tolerances::DEFAULT,
        Batching::Lanes,
    )
    .unwrap();
    let other = IndirectStrokeTessellator::new(
        random_strokes(2, 4),
        &Tolerances::DEFAULT,
        Batching::Scalar,
    )
    .unwrap();
    let expected_instances = indirect.total_instance_count() + other.total_instance_count();
    indirect.chain(other);

    let mut tessellators = vec![
        StrokeTessellator::Indirect(indirect),
        StrokeTessellator::new(
            StrokeStrategy::HardwareTessellation,
            random_strokes(3, 4),
            &Tolerances::DEFAULT,
            &caps,
            Batching::Lanes,
        )
        .unwrap(),
    ];

    for tessellator in &mut tessellators {
        tessellator.prepare(&mut device).unwrap();
    }
    for tessellator in &tessellators {
        tessellator.draw(&mut device);
    }

    assert_eq!(device.drawn_instances().len() as u32, expected_instances);
    let patch_count = match &tessellators[1] {
        StrokeTessellator::Hardware(hardware) => hardware.patch_count(),
        StrokeTessellator::Indirect(_) => unreachable!(),
    };
    assert_eq!(device.drawn_patches().len() as u32, patch_count);
}
