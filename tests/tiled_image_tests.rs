//! TiledImage geometry, animation, update, and reset tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use zoomlet::{
    EngineError, EngineEvent, EngineOptions, EngineProfile, ItemId, ItemOptions, Point,
    PyramidDescriptor, Rect, SourceSpec, TileFetcher, TileFingerprint, UpdatePipeline, Viewport,
};

struct NullFetcher;

impl TileFetcher for NullFetcher {
    fn fetch(&self, _tile: &TileFingerprint) -> zoomlet::Result<Vec<u8>> {
        Ok(vec![0; 8])
    }
}

fn pipeline() -> UpdatePipeline {
    UpdatePipeline::new(EngineProfile::Custom(EngineOptions {
        spring_stiffness: 100.0, // faster animation = faster tests
        ..EngineOptions::default()
    }))
}

/// Tick frames until the predicate holds, failing the test on timeout
fn pump_until(
    pipeline: &mut UpdatePipeline,
    what: &str,
    mut predicate: impl FnMut(&mut UpdatePipeline) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        pipeline.tick(1.0 / 60.0);
        if predicate(pipeline) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn open_tall_item(pipeline: &mut UpdatePipeline) -> ItemId {
    pipeline
        .world_mut()
        .add_item(
            ItemOptions::new(
                SourceSpec::Single(PyramidDescriptor::new("tall.dzi", 500, 2000)),
                Arc::new(NullFetcher),
            )
            .with_position(5.0, 6.0)
            .with_width(10.0),
        )
        .unwrap()
}

fn assert_rect(actual: Rect, expected: Rect, message: &str) {
    assert!(
        (actual.x - expected.x).abs() < 1e-9
            && (actual.y - expected.y).abs() < 1e-9
            && (actual.width - expected.width).abs() < 1e-9
            && (actual.height - expected.height).abs() < 1e-9,
        "{message}: expected {expected:?}, got {actual:?}"
    );
}

#[test]
fn metrics() {
    let mut pipeline = pipeline();
    let id = open_tall_item(&mut pipeline);
    pipeline.drain_events();

    {
        let image = pipeline.world().item(id).unwrap();
        let content = image.content_size();
        assert_eq!(content.x, 500.0, "content width");
        assert_eq!(content.y, 2000.0, "content height");

        assert_rect(
            image.bounds(false),
            Rect::new(5.0, 6.0, 10.0, 40.0),
            "initial bounds",
        );

        // scale = content width / bounds width = 50
        let viewport_point = Point::new(10.0, 11.0);
        let image_point = image.logical_to_content_point(&viewport_point, false);
        assert_eq!(image_point, Point::new(250.0, 250.0));
        let round_trip = image.content_to_logical_point(&image_point, false);
        assert!(round_trip.distance_to(&viewport_point) < 1e-12);

        let viewport_rect = Rect::new(viewport_point.x, viewport_point.y, 6.0, 7.0);
        let image_rect = image.logical_to_content_rect(&viewport_rect, false);
        assert_rect(
            image_rect,
            Rect::new(250.0, 250.0, 300.0, 350.0),
            "logical to content rect",
        );
        assert_rect(
            image.content_to_logical_rect(&image_rect, false),
            viewport_rect,
            "content to logical rect inverse",
        );
    }

    let world = pipeline.world_mut();
    let image = world.item_mut(id).unwrap();
    image.set_position(Point::new(7.0, 8.0)).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(7.0, 8.0, 10.0, 40.0),
        "bounds after position",
    );

    image.set_width(5.0).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(7.0, 8.0, 5.0, 20.0),
        "bounds after width",
    );

    image.set_height(4.0).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(7.0, 8.0, 1.0, 4.0),
        "bounds after height",
    );

    let bounds_changes = pipeline
        .drain_events()
        .iter()
        .filter(|event| matches!(event, EngineEvent::BoundsChange { item } if *item == id))
        .count();
    assert_eq!(bounds_changes, 3, "one bounds-change per mutator");
}

#[test]
fn invalid_arguments_leave_state_unchanged() {
    let mut pipeline = pipeline();
    let id = open_tall_item(&mut pipeline);
    let image = pipeline.world_mut().item_mut(id).unwrap();
    let before = image.bounds(false);

    assert!(matches!(
        image.set_width(-1.0),
        Err(EngineError::InvalidArgument(_))
    ));
    assert!(matches!(
        image.set_height(0.0),
        Err(EngineError::InvalidArgument(_))
    ));
    assert!(matches!(
        image.set_position(Point::new(f64::NAN, 0.0)),
        Err(EngineError::InvalidArgument(_))
    ));
    assert!(matches!(
        image.set_opacity(1.5),
        Err(EngineError::InvalidArgument(_))
    ));
    assert!(matches!(
        image.set_rotation(f64::INFINITY),
        Err(EngineError::InvalidArgument(_))
    ));

    assert_rect(image.bounds(false), before, "state unchanged after rejects");
    assert_eq!(image.opacity(false), 1.0);
}

#[test]
fn animation() {
    let mut pipeline = pipeline();
    let id = pipeline
        .world_mut()
        .add_item(ItemOptions::new(
            SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
            Arc::new(NullFetcher),
        ))
        .unwrap();

    {
        let image = pipeline.world().item(id).unwrap();
        assert_rect(
            image.bounds(false),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            "target bounds on open",
        );
        assert_rect(
            image.bounds(true),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            "current bounds on open",
        );
    }

    let image = pipeline.world_mut().item_mut(id).unwrap();
    image.set_position(Point::new(1.0, 2.0)).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(1.0, 2.0, 1.0, 1.0),
        "target bounds after position",
    );
    assert_rect(
        image.bounds(true),
        Rect::new(0.0, 0.0, 1.0, 1.0),
        "current bounds after position",
    );

    image.set_width(3.0).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(1.0, 2.0, 3.0, 3.0),
        "target bounds after width",
    );
    assert_rect(
        image.bounds(true),
        Rect::new(0.0, 0.0, 1.0, 1.0),
        "current bounds after width",
    );

    pipeline.drain_events();
    pump_until(&mut pipeline, "animation to settle", |p| {
        p.world().item(id).unwrap().is_settled()
    });

    let image = pipeline.world().item(id).unwrap();
    assert_rect(
        image.bounds(false),
        Rect::new(1.0, 2.0, 3.0, 3.0),
        "target bounds after animation",
    );
    assert_rect(
        image.bounds(true),
        Rect::new(1.0, 2.0, 3.0, 3.0),
        "current bounds after animation",
    );

    let finishes = pipeline
        .drain_events()
        .iter()
        .filter(|event| matches!(event, EngineEvent::AnimationFinish { item } if *item == id))
        .count();
    assert_eq!(finishes, 1, "animation-finish fires exactly once");
}

#[test]
fn update_emits_levels_then_tiles() {
    let mut pipeline = pipeline();
    pipeline.set_viewport(Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1024.0));
    let id = pipeline
        .world_mut()
        .add_item(ItemOptions::new(
            SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
            Arc::new(NullFetcher),
        ))
        .unwrap();

    assert!(
        pipeline.world().item(id).unwrap().needs_draw(),
        "needs draw after open"
    );

    pump_until(&mut pipeline, "first tiles to load", |p| {
        p.cache().num_tiles_loaded() > 0
    });
    // One more tick so completed tiles enter the draw list
    pump_until(&mut pipeline, "draw list to fill", |p| {
        !p.world().item(id).unwrap().draw_list().is_empty()
    });

    let events = pipeline.drain_events();

    let first_level = events
        .iter()
        .position(|event| matches!(event, EngineEvent::UpdateLevel { .. }))
        .expect("update-level fired");
    let first_tile = events
        .iter()
        .position(|event| matches!(event, EngineEvent::UpdateTile { .. }))
        .expect("update-tile fired");
    assert!(
        first_level < first_tile,
        "level passes precede tile completions"
    );

    // Levels are considered coarse to fine with the ideal level flagged
    let levels: Vec<(usize, bool)> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::UpdateLevel { level, best, .. } => Some((*level, *best)),
            _ => None,
        })
        .collect();
    let per_pass = pipeline
        .world()
        .item(id)
        .unwrap()
        .pyramid()
        .level_count();
    assert!(levels.len() >= per_pass);
    let pass = &levels[..per_pass];
    assert_eq!(
        pass.iter().map(|(level, _)| *level).collect::<Vec<_>>(),
        (0..per_pass).collect::<Vec<_>>(),
        "coarse to fine order"
    );
    assert!(pass.last().unwrap().1, "finest considered level is best");

    for event in &events {
        if let EngineEvent::UpdateLevel {
            item,
            opacity,
            visibility,
            top_left,
            bottom_right,
            tick,
            ..
        } = event
        {
            assert_eq!(*item, id);
            assert_eq!(*opacity, 1.0);
            assert!((0.0..=1.0).contains(visibility));
            assert!(bottom_right.x > top_left.x);
            assert!(*tick > 0);
            break;
        }
    }

    let tile_events = events
        .iter()
        .filter(|event| matches!(event, EngineEvent::UpdateTile { item, .. } if *item == id))
        .count();
    assert!(tile_events > 0, "update-tile fired per newly resident tile");
}

#[test]
fn reset_and_destroy_clear_the_cache() {
    let mut pipeline = pipeline();
    pipeline.set_viewport(Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 512.0));
    let id = pipeline
        .world_mut()
        .add_item(ItemOptions::new(
            SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
            Arc::new(NullFetcher),
        ))
        .unwrap();

    assert_eq!(pipeline.cache().num_tiles_loaded(), 0, "no tiles at start");

    pump_until(&mut pipeline, "tiles to load", |p| {
        p.cache().num_tiles_loaded() > 0
    });

    pipeline.world_mut().item_mut(id).unwrap().reset();
    assert_eq!(
        pipeline.cache().num_tiles_loaded(),
        0,
        "no tiles after reset"
    );

    pump_until(&mut pipeline, "tiles to reload", |p| {
        p.cache().num_tiles_loaded() > 0
    });

    pipeline.world_mut().item_mut(id).unwrap().destroy();
    assert_eq!(
        pipeline.cache().num_tiles_loaded(),
        0,
        "no tiles after destroy"
    );

    // Destroy is idempotent and destroyed items sit out of the frame loop
    pipeline.world_mut().item_mut(id).unwrap().destroy();
    pipeline.tick(1.0 / 60.0);
    assert_eq!(pipeline.cache().num_tiles_loaded(), 0);
}

#[test]
fn clip() {
    let clip = Rect::new(100.0, 100.0, 800.0, 800.0);
    let mut pipeline = pipeline();
    let id = pipeline
        .world_mut()
        .add_item(
            ItemOptions::new(
                SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
                Arc::new(NullFetcher),
            )
            .with_clip(clip),
        )
        .unwrap();

    let image = pipeline.world_mut().item_mut(id).unwrap();
    assert_eq!(image.clip(), Some(clip), "image has correct clip");

    image.set_clip(None).unwrap();
    assert_eq!(image.clip(), None, "clip is cleared");

    image.set_clip(Some(clip)).unwrap();
    assert_eq!(image.clip(), Some(clip), "clip is set correctly");

    assert!(matches!(
        image.set_clip(Some(Rect::new(0.0, 0.0, -5.0, 10.0))),
        Err(EngineError::InvalidArgument(_))
    ));
    assert_eq!(image.clip(), Some(clip), "invalid clip rejected");
}

#[test]
fn opacity() {
    let mut pipeline = pipeline();
    let id = pipeline
        .world_mut()
        .add_item(
            ItemOptions::new(
                SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
                Arc::new(NullFetcher),
            )
            .with_opacity(0.5),
        )
        .unwrap();

    let image = pipeline.world_mut().item_mut(id).unwrap();
    assert_eq!(image.opacity(false), 0.5, "image has configured opacity");

    image.set_opacity(1.0).unwrap();
    assert_eq!(image.opacity(false), 1.0, "opacity target set correctly");
    assert_eq!(image.opacity(true), 0.5, "current opacity eases later");

    image.set_opacity(0.0).unwrap();
    assert_eq!(image.opacity(false), 0.0);

    pump_until(&mut pipeline, "opacity to settle", |p| {
        p.world().item(id).unwrap().is_settled()
    });
    assert_eq!(pipeline.world().item(id).unwrap().opacity(true), 0.0);
}

#[test]
fn offscreen_items_release_interest() {
    let mut pipeline = pipeline();
    pipeline.set_viewport(Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 512.0));
    let id = pipeline
        .world_mut()
        .add_item(ItemOptions::new(
            SourceSpec::Single(PyramidDescriptor::new("square.dzi", 1000, 1000)),
            Arc::new(NullFetcher),
        ))
        .unwrap();

    pump_until(&mut pipeline, "tiles to load", |p| {
        !p.world().item(id).unwrap().draw_list().is_empty()
    });

    // Pan the viewport away; the item keeps no references but its tiles
    // stay warm in the cache
    pipeline.set_viewport(Viewport::new(Rect::new(10.0, 10.0, 1.0, 1.0), 512.0));
    pipeline.tick(1.0 / 60.0);
    assert!(pipeline.world().item(id).unwrap().draw_list().is_empty());
    assert!(pipeline.cache().num_tiles_loaded() > 0, "tiles stay warm");

    // Pan back; the draw list refills from the warm cache
    pipeline.set_viewport(Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 512.0));
    pump_until(&mut pipeline, "draw list to refill", |p| {
        !p.world().item(id).unwrap().draw_list().is_empty()
    });
}
