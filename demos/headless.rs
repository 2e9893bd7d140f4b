use std::sync::Arc;
use std::time::Duration;

use instant::Instant;

use zoomlet::{
    EngineProfile, ItemOptions, Point, PyramidDescriptor, Rect, SourceSpec, TileFetcher,
    TileFingerprint, UpdatePipeline, Viewport,
};

/// Synthesizes a flat-color tile so the engine can be driven without any
/// network or decoder.
struct CheckerFetcher {
    shade: u8,
}

impl TileFetcher for CheckerFetcher {
    fn fetch(&self, tile: &TileFingerprint) -> zoomlet::Result<Vec<u8>> {
        let parity = ((tile.col + tile.row) % 2) as u8;
        Ok(vec![self.shade ^ (parity * 0xFF); 64])
    }
}

/// Example of driving the engine headless, without a renderer
fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Zoomlet headless example");
    println!("========================");

    let mut pipeline = UpdatePipeline::new(EngineProfile::Balanced);
    pipeline.set_viewport(Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1024.0));

    // Two pyramids composed side by side in logical space
    let tall = PyramidDescriptor::new("tall.dzi", 500, 2000);
    let wide = PyramidDescriptor::new("wide.dzi", 2000, 500);

    let first = pipeline.world_mut().add_item(
        ItemOptions::new(
            SourceSpec::Single(tall),
            Arc::new(CheckerFetcher { shade: 0x40 }),
        )
        .with_width(0.4),
    )?;
    let second = pipeline.world_mut().add_item(
        ItemOptions::new(
            SourceSpec::Single(wide),
            Arc::new(CheckerFetcher { shade: 0xC0 }),
        )
        .with_position(0.5, 0.0)
        .with_width(0.5),
    )?;

    println!("World has {} items", pipeline.world().item_count());

    // Kick off an animated move of the second item
    pipeline
        .world_mut()
        .item_mut(second)
        .unwrap()
        .set_position(Point::new(0.5, 0.5))?;

    // Drive frames until animation settles and tiles arrive
    let started = Instant::now();
    let mut frames = 0;
    loop {
        let report = pipeline.tick(1.0 / 60.0);
        frames += 1;

        for event in pipeline.drain_events() {
            log::debug!("event: {event:?}");
        }

        if !report.needs_frame || started.elapsed() > Duration::from_secs(5) {
            println!(
                "Settled after {} frames: {} items in plan, {} tiles resident",
                frames,
                report.plan.items.len(),
                pipeline.cache().num_tiles_loaded()
            );
            for frame in &report.plan.items {
                println!(
                    "  {:?} bounds ({:.2}, {:.2}, {:.2}, {:.2}) with {} tiles",
                    frame.item,
                    frame.bounds.x,
                    frame.bounds.y,
                    frame.bounds.width,
                    frame.bounds.height,
                    frame.tiles.len()
                );
            }
            break;
        }

        std::thread::sleep(Duration::from_millis(2));
    }

    // Coordinate round trip on the first item
    let world = pipeline.world();
    let item = world.item(first).unwrap();
    let logical = Point::new(0.2, 0.8);
    let content = item.logical_to_content_point(&logical, false);
    let back = item.content_to_logical_point(&content, false);
    println!(
        "Round trip ({:.3}, {:.3}) -> ({:.1}, {:.1}) -> ({:.3}, {:.3})",
        logical.x, logical.y, content.x, content.y, back.x, back.y
    );

    println!("Done.");
    Ok(())
}
