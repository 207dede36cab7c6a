use cemetery_core::{
    generate_layout, generate_plot_grid, paint_document, MapDocument, PlotIndex,
};
use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use plot_proto::Plot;

const SECTIONS: [&str; 5] = ["lb-10", "apartment-5", "veterans", "fetus", "garden-7"];

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    for section in SECTIONS {
        group.bench_with_input(BenchmarkId::new("generate_layout", section), &section, |b, section| {
            b.iter(|| generate_layout(section))
        });
        group.bench_with_input(BenchmarkId::new("plot_grid", section), &section, |b, section| {
            b.iter(|| generate_plot_grid(section))
        });
    }

    group.finish();
}

fn synthetic_map(blocks: u32) -> (String, Vec<Plot>) {
    let mut svg = String::from("<svg>");
    let mut plots = Vec::new();
    for block in 1..=blocks {
        for letter in ['a', 'b', 'c', 'd'] {
            let id = format!("lb-{block}{letter}");
            svg.push_str(&format!(r#"<rect id="{id}" fill="ccc"/>"#));
            if block % 2 == 0 {
                plots.push(Plot {
                    occupant_name: format!("Occupant {block}{letter}"),
                    ..Plot::placeholder(id)
                });
            }
        }
        svg.push_str(&format!(r#"<rect id="rect{block}"/>"#));
    }
    svg.push_str("</svg>");
    (svg, plots)
}

fn bench_paint(c: &mut Criterion) {
    let mut group = c.benchmark_group("paint");
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

    for blocks in [16u32, 64, 256] {
        let (svg, plots) = synthetic_map(blocks);
        let index = PlotIndex::from_plots(plots);
        group.bench_with_input(BenchmarkId::new("document", blocks), &blocks, |b, _| {
            b.iter_batched(
                || MapDocument::parse(svg.clone()),
                |mut doc| paint_document(&mut doc, &index, today),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(layout_benches, bench_layout, bench_paint);
criterion_main!(layout_benches);
