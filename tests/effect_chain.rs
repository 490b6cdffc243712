//! Integration tests for per-track effect chains and their rebuilds

use gridbeat::context::{AudioContext, NodeId};
use gridbeat::effects::{DelayPatch, EffectPatch, FilterPatch, ReverbParams, ReverbPatch, Rolloff};
use gridbeat::{EffectId, EffectKind, EffectParams, EffectsConfig, EffectsEngine};

fn engine() -> EffectsEngine {
    EffectsEngine::new(AudioContext::new(44100.0), EffectsConfig::default()).unwrap()
}

/// input, the nodes of `ids` in order, output
fn expected_path(engine: &EffectsEngine, track: usize, ids: &[EffectId]) -> Vec<NodeId> {
    let chain = engine.chain(track).unwrap();
    let mut path = vec![chain.input()];
    path.extend(ids.iter().map(|&id| chain.node_of(id).unwrap()));
    path.push(chain.output());
    path
}

fn output_is_wired(engine: &EffectsEngine, track: usize) -> bool {
    let output = engine.chain(track).unwrap().output();
    let graph = engine.context().lock().unwrap();
    graph.is_connected(output, graph.destination())
}

#[test]
fn test_single_reverb_on_track() {
    let mut engine = engine();
    let params = EffectParams::Reverb(ReverbParams::new(0.4, 1.5, 0.3));
    let id = engine.add_effect_with(2, params).unwrap();

    let effects = engine.effects(2);
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].id, id);
    assert_eq!(effects[0].kind, EffectKind::Reverb);
    assert!(effects[0].enabled, "New entries start enabled");
    assert_eq!(effects[0].params, params);

    assert_eq!(engine.signal_path(2), expected_path(&engine, 2, &[id]));
}

#[test]
fn test_effects_run_in_insertion_order() {
    let mut engine = engine();
    let reverb = engine.add_effect(0, EffectKind::Reverb).unwrap();
    let delay = engine.add_effect(0, EffectKind::Delay).unwrap();

    assert_eq!(engine.signal_path(0), expected_path(&engine, 0, &[reverb, delay]));
}

#[test]
fn test_disabled_entry_is_skipped_and_restored() {
    let mut engine = engine();
    let reverb = engine.add_effect(0, EffectKind::Reverb).unwrap();
    let delay = engine.add_effect(0, EffectKind::Delay).unwrap();
    let nodes_before = engine.chain(0).unwrap().node_ids();

    assert!(engine.toggle_effect(0, reverb));
    assert!(!engine.chain(0).unwrap().effect(reverb).unwrap().enabled);
    assert_eq!(engine.signal_path(0), expected_path(&engine, 0, &[delay]));

    assert!(engine.toggle_effect(0, reverb));
    assert_eq!(engine.signal_path(0), expected_path(&engine, 0, &[reverb, delay]));

    // Re-enabling reuses the same nodes
    assert_eq!(engine.chain(0).unwrap().node_ids(), nodes_before);
}

#[test]
fn test_remove_disposes_node() {
    let mut engine = engine();
    let reverb = engine.add_effect(0, EffectKind::Reverb).unwrap();
    let delay = engine.add_effect(0, EffectKind::Delay).unwrap();
    let delay_node = engine.chain(0).unwrap().node_of(delay).unwrap();

    assert!(engine.remove_effect(0, delay));

    let chain = engine.chain(0).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.effects()[0].id, reverb);
    assert!(chain.effect(delay).is_none());
    assert!(!chain.node_ids().contains(&delay_node));
    assert!(!engine.context().lock().unwrap().contains(delay_node), "Removed node should leave the graph");
    assert_eq!(engine.signal_path(0), expected_path(&engine, 0, &[reverb]));
}

#[test]
fn test_sequences_stay_aligned() {
    let mut engine = engine();
    let mut ids = Vec::new();
    for kind in EffectKind::ALL {
        ids.push(engine.add_effect(1, kind).unwrap());
    }
    ids.push(engine.add_effect(1, EffectKind::Delay).unwrap());

    assert!(engine.remove_effect(1, ids[1]));
    assert!(engine.remove_effect(1, ids[4]));
    ids.push(engine.add_effect(1, EffectKind::Filter).unwrap());

    let chain = engine.chain(1).unwrap();
    assert_eq!(chain.effects().len(), chain.node_ids().len());
    let graph = engine.context().lock().unwrap();
    for (effect, node) in chain.effects().iter().zip(chain.node_ids()) {
        assert_eq!(chain.node_of(effect.id), Some(node));
        assert_eq!(graph.effect(node).map(|n| n.kind()), Some(effect.kind));
    }
}

#[test]
fn test_empty_and_all_disabled_chains_bypass() {
    let mut engine = engine();
    engine.get_or_create_chain(3).unwrap();
    assert_eq!(engine.signal_path(3), expected_path(&engine, 3, &[]));

    let a = engine.add_effect(3, EffectKind::Filter).unwrap();
    let b = engine.add_effect(3, EffectKind::Distortion).unwrap();
    engine.set_effect_enabled(3, a, false);
    engine.set_effect_enabled(3, b, false);

    assert!(!engine.has_enabled_effects(3));
    assert_eq!(engine.signal_path(3), expected_path(&engine, 3, &[]));
}

#[test]
fn test_output_stays_wired_to_destination() {
    let mut engine = engine();
    engine.get_or_create_chain(0).unwrap();
    assert!(output_is_wired(&engine, 0));

    let a = engine.add_effect(0, EffectKind::Reverb).unwrap();
    assert!(output_is_wired(&engine, 0));
    let b = engine.add_effect(0, EffectKind::Filter).unwrap();
    engine.toggle_effect(0, a);
    assert!(output_is_wired(&engine, 0));
    engine.remove_effect(0, b);
    assert!(output_is_wired(&engine, 0));
    engine.remove_effect(0, a);
    assert!(output_is_wired(&engine, 0));
}

#[test]
fn test_repeated_update_matches_single_update() {
    let mut engine = engine();
    let id = engine.add_effect(0, EffectKind::Delay).unwrap();
    let patch = EffectPatch::Delay(DelayPatch {
        time: Some(0.5),
        feedback: Some(0.6),
        ..Default::default()
    });

    assert!(engine.update_effect(0, id, &patch));
    let once = engine.node_params(0, id).unwrap();
    assert!(engine.update_effect(0, id, &patch));
    let twice = engine.node_params(0, id).unwrap();

    assert_eq!(once, twice);
    assert_eq!(engine.chain(0).unwrap().effect(id).unwrap().params, twice);
    match twice {
        EffectParams::Delay(p) => {
            assert_eq!(p.time, 0.5);
            assert_eq!(p.feedback, 0.6);
            assert_eq!(p.wet, 0.3, "Unspecified fields keep their value");
        }
        other => panic!("expected delay params, got {:?}", other),
    }
}

#[test]
fn test_update_does_not_touch_topology() {
    let mut engine = engine();
    let id = engine.add_effect(0, EffectKind::Filter).unwrap();
    let path = engine.signal_path(0);

    let patch = EffectPatch::Filter(FilterPatch {
        frequency: Some(800.0),
        rolloff: Some(Rolloff::Db48),
        ..Default::default()
    });
    assert!(engine.update_effect(0, id, &patch));
    assert_eq!(engine.signal_path(0), path);
}

#[test]
fn test_feedback_update_is_capped() {
    let mut engine = engine();
    let id = engine.add_effect(0, EffectKind::Delay).unwrap();
    let patch = EffectPatch::Delay(DelayPatch {
        feedback: Some(1.5),
        ..Default::default()
    });
    assert!(engine.update_effect(0, id, &patch));
    match engine.node_params(0, id).unwrap() {
        EffectParams::Delay(p) => assert_eq!(p.feedback, 0.9),
        other => panic!("expected delay params, got {:?}", other),
    }
}

#[test]
fn test_update_records_what_the_node_accepted() {
    let config = EffectsConfig::default().with_max_delay_seconds(0.5);
    let mut engine = EffectsEngine::new(AudioContext::new(44100.0), config).unwrap();
    let id = engine.add_effect(0, EffectKind::Delay).unwrap();
    let patch = EffectPatch::Delay(DelayPatch {
        time: Some(0.8),
        ..Default::default()
    });
    assert!(engine.update_effect(0, id, &patch));

    let entry = engine.effects(0)[0].params;
    assert_eq!(entry, engine.node_params(0, id).unwrap());
    match entry {
        EffectParams::Delay(p) => assert_eq!(p.time, 0.5),
        other => panic!("expected delay params, got {:?}", other),
    }
}

#[test]
fn test_mismatched_patch_is_ignored() {
    let mut engine = engine();
    let id = engine.add_effect(0, EffectKind::Filter).unwrap();
    let before = engine.node_params(0, id).unwrap();

    let patch = EffectPatch::Reverb(ReverbPatch {
        wet: Some(1.0),
        ..Default::default()
    });
    assert!(!engine.update_effect(0, id, &patch));
    assert_eq!(engine.node_params(0, id).unwrap(), before);
}

#[test]
fn test_double_toggle_restores_path() {
    let mut engine = engine();
    let a = engine.add_effect(4, EffectKind::Distortion).unwrap();
    engine.add_effect(4, EffectKind::Reverb).unwrap();
    let path = engine.signal_path(4);

    engine.toggle_effect(4, a);
    assert_ne!(engine.signal_path(4), path);
    engine.toggle_effect(4, a);
    assert_eq!(engine.signal_path(4), path);
}

#[test]
fn test_unknown_ids_are_noops() {
    let mut engine = engine();
    let id = engine.add_effect(0, EffectKind::Reverb).unwrap();
    assert!(engine.remove_effect(0, id));
    let path = engine.signal_path(0);

    let patch = EffectPatch::Reverb(ReverbPatch::default());
    assert!(!engine.remove_effect(0, id));
    assert!(!engine.toggle_effect(0, id));
    assert!(!engine.update_effect(0, id, &patch));
    assert!(!engine.remove_effect(9, id), "Track without a chain");

    assert!(engine.chain(9).is_none(), "No-ops must not create chains");
    assert_eq!(engine.signal_path(0), path);
}

#[test]
fn test_ids_are_never_reused() {
    let mut engine = engine();
    let a = engine.add_effect(0, EffectKind::Reverb).unwrap();
    engine.remove_effect(0, a);
    let b = engine.add_effect(0, EffectKind::Reverb).unwrap();
    let c = engine.add_effect(1, EffectKind::Reverb).unwrap();
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[test]
fn test_same_kind_may_repeat() {
    let mut engine = engine();
    let a = engine.add_effect(0, EffectKind::Filter).unwrap();
    let b = engine.add_effect(0, EffectKind::Filter).unwrap();
    assert_eq!(engine.signal_path(0), expected_path(&engine, 0, &[a, b]));
}

#[test]
fn test_full_chain_rejects_add() {
    let context = AudioContext::new(44100.0);
    let config = EffectsConfig::default().with_max_effects_per_chain(2);
    let mut engine = EffectsEngine::new(context, config).unwrap();

    assert!(engine.add_effect(0, EffectKind::Reverb).is_some());
    assert!(engine.add_effect(0, EffectKind::Delay).is_some());
    assert!(engine.add_effect(0, EffectKind::Filter).is_none());
    assert_eq!(engine.effects(0).len(), 2, "Failed add must not record an entry");
}

#[test]
fn test_failed_construction_records_nothing() {
    let context = AudioContext::new(44100.0);
    // A delay line this long is refused by the factory
    let config = EffectsConfig::default().with_max_delay_seconds(3600.0);
    let mut engine = EffectsEngine::new(context.clone(), config).unwrap();
    let nodes_before = context.lock().unwrap().node_count();

    assert!(engine.add_effect(0, EffectKind::Delay).is_none());
    assert!(engine.effects(0).is_empty());
    // Only the chain's two boundaries were added
    assert_eq!(context.lock().unwrap().node_count(), nodes_before + 2);
}

#[test]
fn test_dispose_releases_everything() {
    let context = AudioContext::new(44100.0);
    let mut engine = EffectsEngine::new(context.clone(), EffectsConfig::default()).unwrap();
    engine.add_effect(0, EffectKind::Reverb).unwrap();
    engine.add_effect(1, EffectKind::Delay).unwrap();
    engine.get_or_create_chain(2).unwrap();

    engine.dispose();

    assert!(engine.is_disposed());
    assert_eq!(context.lock().unwrap().node_count(), 1, "Only the destination remains");
    assert!(engine.get_or_create_chain(0).is_err());
    assert!(engine.add_effect(0, EffectKind::Reverb).is_none());
    assert!(engine.tracks().next().is_none());
}

#[test]
fn test_drop_releases_everything() {
    let context = AudioContext::new(44100.0);
    {
        let mut engine = EffectsEngine::new(context.clone(), EffectsConfig::default()).unwrap();
        engine.add_effect(0, EffectKind::Filter).unwrap();
    }
    assert_eq!(context.lock().unwrap().node_count(), 1);
}

#[test]
fn test_unsupported_rate_is_unavailable() {
    assert!(EffectsEngine::new(AudioContext::new(4000.0), EffectsConfig::default()).is_err());
    let narrow = EffectsConfig::default().with_sample_rate_range(48000.0, 48000.0);
    assert!(EffectsEngine::new(AudioContext::new(44100.0), narrow).is_err());
}
