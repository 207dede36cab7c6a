mod common;

use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use cemetery_core::{
    generate_directions, painted_status, ClickOutcome, EventBus, MapController, MapEvent,
    PlotIndex, PlotStore, View,
};
use plot_proto::{PlotPatch, PlotStatus};

fn controller() -> MapController {
    MapController::new(
        Arc::new(Mutex::new(common::fixture_map())),
        Arc::new(RwLock::new(PlotIndex::default())),
        EventBus::new(64),
    )
    .with_clock(common::fixed_today)
}

#[tokio::test]
async fn refresh_paints_every_plot_element() -> Result<()> {
    let store = common::fixture_store();
    let mut controller = controller();
    let report = controller
        .refresh(&store)
        .await?
        .expect("refresh not superseded");

    assert_eq!(report.painted, 5);
    let doc = controller.document().lock().expect("document lock");
    assert_eq!(painted_status(&doc, "lb-10a"), Some(PlotStatus::Occupied));
    assert_eq!(painted_status(&doc, "lb-10b"), Some(PlotStatus::Reserved));
    assert_eq!(painted_status(&doc, "RB-2C"), Some(PlotStatus::Exhumed));
    assert_eq!(painted_status(&doc, "apartment-5"), Some(PlotStatus::Available));
    // unknown explicit status falls through to the occupant rule
    assert_eq!(painted_status(&doc, "veterans"), Some(PlotStatus::Occupied));
    assert_eq!(painted_status(&doc, "rect110"), None);
    assert_eq!(painted_status(&doc, "office"), None);
    Ok(())
}

#[tokio::test]
async fn click_through_to_a_tomb_and_back() -> Result<()> {
    let store = common::fixture_store();
    let mut controller = controller();
    let mut events = controller.bus().subscribe();

    for decorative in ["rect110", "layer3"] {
        assert_eq!(controller.click_element(decorative), ClickOutcome::Ignored);
        assert_eq!(controller.view(), View::Overview);
    }

    let outcome = controller.click_element("apartment-5");
    assert_eq!(
        outcome,
        ClickOutcome::SectionOpened {
            section: "apartment-5".to_string(),
            levels: 3
        }
    );
    controller.choose_level(3)?;
    assert!(controller.open_tomb(&store, "apartment-5-3h").await?);

    let tomb = controller.tomb().expect("tomb detail");
    assert_eq!(tomb.plot.occupant_name, "Maria Santos");
    assert_eq!(tomb.resolved.status, PlotStatus::Occupied);
    assert!(!tomb.placeholder);

    let steps = controller.show_directions(None).expect("directions").to_vec();
    assert_eq!(steps, generate_directions("apartment-5-3h"));
    assert!(steps.iter().any(|step| step.location == "Level 3, Tomb H"));

    assert_eq!(controller.back(), View::Level);
    assert_eq!(controller.back(), View::Section);
    assert_eq!(controller.back(), View::Overview);
    assert!(controller.layout().is_none());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(MapEvent::SectionOpened { .. })));
    assert!(seen.contains(&MapEvent::OverviewRestored));
    Ok(())
}

#[tokio::test]
async fn admin_edits_flow_through_the_subscription() -> Result<()> {
    let store = common::fixture_store();
    let subscription = store.subscribe_to_changes();
    let mut controller = controller();
    controller.refresh(&store).await?;

    store
        .update_plot(
            "lb-10b",
            PlotPatch {
                occupant_name: Some("Luz Garcia".to_string()),
                date_of_interment: Some("2024-06-01".to_string()),
                ..PlotPatch::default()
            },
        )
        .await?;
    store.delete_plot("lb-10a").await?;

    for change in subscription.drain() {
        controller.apply_change(change);
    }

    let doc = controller.document().lock().expect("document lock");
    assert_eq!(painted_status(&doc, "lb-10b"), Some(PlotStatus::Occupied));
    assert_eq!(painted_status(&doc, "lb-10a"), Some(PlotStatus::Available));
    Ok(())
}

#[tokio::test]
async fn stale_tomb_fetch_is_not_applied() -> Result<()> {
    let store = common::fixture_store();
    let mut controller = controller();
    controller.click_element("lb-10a");
    controller.choose_level(1)?;

    let pending = controller.begin_tomb_selection("lb-10a")?;
    let plot = store.get_plot(&pending.plot_id).await?;
    controller.back();
    controller.click_element("rb-2c");
    controller.choose_level(1)?;

    assert!(!controller.finish_tomb_selection(pending, plot));
    assert_eq!(controller.view(), View::Level);
    assert!(controller.tomb().is_none());
    Ok(())
}

#[tokio::test]
async fn block_tomb_detail_matches_the_painted_map() -> Result<()> {
    let store = common::fixture_store();
    let mut controller = controller();
    controller.refresh(&store).await?;
    controller.click_element("lb-10a");
    controller.choose_level(1)?;

    let first = controller
        .level_tombs()
        .first()
        .map(|(tomb, _)| tomb.id.clone())
        .expect("level one has tombs");
    assert_eq!(first, "lb-10a");
    assert!(controller.open_tomb(&store, &first).await?);

    let tomb = controller.tomb().expect("tomb detail");
    assert!(!tomb.placeholder);
    assert_eq!(tomb.plot.occupant_name, "Ana Cruz");
    {
        let doc = controller.document().lock().expect("document lock");
        assert_eq!(painted_status(&doc, "lb-10a"), Some(tomb.resolved.status));
    }

    let edited = controller
        .apply_admin_edit(
            &store,
            &first,
            PlotPatch {
                status: Some("exhumed".to_string()),
                ..PlotPatch::default()
            },
        )
        .await?;
    assert_eq!(edited.plot_id, "lb-10a");
    let doc = controller.document().lock().expect("document lock");
    assert_eq!(painted_status(&doc, "lb-10a"), Some(PlotStatus::Exhumed));
    Ok(())
}
