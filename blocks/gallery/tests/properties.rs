mod support;

use gallery_block::reconciler::next_display_order;
use gallery_block::{GallerySession, PendingImage, MAX_DISPLAY_ORDER};
use proptest::prelude::*;
use support::{feature_count, png, saved, Harness};

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Upload,
    Remove(usize),
    Feature(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..4).prop_map(Op::Add),
        Just(Op::Upload),
        any::<usize>().prop_map(Op::Remove),
        any::<usize>().prop_map(Op::Feature),
    ]
}

fn ids(session: &GallerySession) -> Vec<String> {
    session.entries().into_iter().map(|e| e.id).collect()
}

async fn apply(session: &mut GallerySession, op: &Op, step: usize) {
    match op {
        Op::Add(n) => {
            let files = (0..*n).map(|i| png(&format!("s{}-{}.png", step, i))).collect();
            session.add_files(files).await.unwrap();
        }
        Op::Upload => {
            session.upload().await.unwrap();
        }
        Op::Remove(pick) => {
            let ids = ids(session);
            if !ids.is_empty() {
                session.remove_image(&ids[pick % ids.len()]).await.unwrap();
            }
        }
        Op::Feature(pick) => {
            let ids = ids(session);
            if !ids.is_empty() {
                session.set_feature(&ids[pick % ids.len()]).await.unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn exactly_one_feature_after_every_operation(
        saved_count in 0usize..4,
        ops in proptest::collection::vec(op(), 1..16),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let rows = (0..saved_count)
                .map(|i| saved(&format!("r{}", i), i as i32 + 1, false))
                .collect();
            let h = Harness::with_rows(rows);
            let mut session = h.open().await;

            for (step, op) in ops.iter().enumerate() {
                apply(&mut session, op, step).await;
                let total = session.persisted().len() + session.pending().len();
                let expected = usize::from(total > 0);
                assert_eq!(feature_count(&session), expected, "after {:?}", op);
            }
        });
    }

    #[test]
    fn next_order_exceeds_every_existing_order(
        saved_orders in proptest::collection::vec(prop_oneof![1i32..1000, (MAX_DISPLAY_ORDER - 2)..=i32::MAX], 0..8),
        pending_orders in proptest::collection::vec(1i32..1000, 0..8),
    ) {
        let persisted: Vec<_> = saved_orders
            .iter()
            .enumerate()
            .map(|(i, order)| saved(&format!("r{}", i), *order, false))
            .collect();
        let pending: Vec<_> = pending_orders
            .iter()
            .map(|order| PendingImage::new("x.png", *order))
            .collect();

        match next_display_order(&persisted, &pending) {
            Some(next) => {
                prop_assert!((1..=MAX_DISPLAY_ORDER).contains(&next));
                prop_assert!(persisted.iter().all(|img| next > img.display_order));
                prop_assert!(pending.iter().all(|img| next > img.display_order));
            }
            None => prop_assert!(persisted.iter().any(|img| img.display_order >= MAX_DISPLAY_ORDER)),
        }
    }
}
