use super::*;
use crate::constants::{COMMON_CLASS_ID, OPTION_POOL_ID};
use crate::errors::Error;
use crate::ledger::{Holder, HolderKind, PreferredTerms, ShareClass, ShareLedger};
use crate::settings::{EngineSettings, SeniorityTieBreak};
use crate::snapshot::CapTableSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Series {
    id: &'static str,
    round_index: u32,
    shares: u64,
    investment: Decimal,
    participating: bool,
    cap: Option<Decimal>,
}

impl Series {
    fn new(id: &'static str, round_index: u32, shares: u64, investment: Decimal) -> Self {
        Self {
            id,
            round_index,
            shares,
            investment,
            participating: false,
            cap: None,
        }
    }

    fn participating(mut self, cap: Option<Decimal>) -> Self {
        self.participating = true;
        self.cap = cap;
        self
    }
}

fn cap_table(founders: &[(&str, u64)], pool: u64, series: Vec<Series>) -> CapTableSnapshot {
    let common_total: u64 = founders.iter().map(|(_, s)| s).sum();
    let mut classes = vec![ShareClass::common(COMMON_CLASS_ID, "Common", common_total)];
    let mut holders: Vec<Holder> = founders
        .iter()
        .map(|(id, shares)| Holder::new(id, id, COMMON_CLASS_ID, HolderKind::Founder, *shares))
        .collect();

    for s in series {
        classes.push(ShareClass::preferred(
            s.id,
            s.id,
            s.shares,
            s.investment,
            PreferredTerms {
                seniority: 0,
                liquidation_multiple: dec!(1),
                participating: s.participating,
                participation_cap: s.cap,
                round_index: s.round_index,
            },
        ));
        holders.push(Holder::new(
            &format!("{}:investor", s.id),
            s.id,
            s.id,
            HolderKind::Investor,
            s.shares,
        ));
    }

    let ledger = ShareLedger::new(classes, holders).unwrap().with_pool_top_up(pool);
    CapTableSnapshot::from_ledger(&ledger)
}

fn series_a_table(series_a: Series) -> CapTableSnapshot {
    cap_table(&[("alice", 4_000_000), ("bob", 4_000_000)], 0, vec![series_a])
}

fn payout(result: &ExitResult, holder_id: &str) -> Decimal {
    result.payout_for(holder_id).unwrap()
}

fn assert_close(actual: Decimal, expected: Decimal) {
    assert!(
        (actual - expected).abs() <= dec!(0.00001),
        "expected {} to be close to {}",
        actual,
        expected
    );
}

#[test]
fn test_non_participating_investor_converts_at_large_exit() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let result = WaterfallEngine::default().run(&table, dec!(50000000)).unwrap();

    assert_eq!(payout(&result, "alice"), dec!(20000000));
    assert_eq!(payout(&result, "bob"), dec!(20000000));
    assert_eq!(payout(&result, "series-a:investor"), dec!(10000000));
    assert_eq!(result.total_distributed, dec!(50000000));

    let investor = &result.per_holder[2];
    assert!(investor.converted_to_common);
    assert_eq!(investor.multiple_on_investment, Some(dec!(5)));
    assert_eq!(result.per_holder[0].multiple_on_investment, None);

    let class = result.class_payout("series-a").unwrap();
    assert_eq!(class.preference_paid, dec!(0));
    assert_eq!(class.common_paid, dec!(10000000));
    assert_eq!(result.converted_classes().count(), 1);
}

#[test]
fn test_non_participating_investor_keeps_preference_at_small_exit() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let result = WaterfallEngine::default().run(&table, dec!(5000000)).unwrap();

    assert_eq!(payout(&result, "series-a:investor"), dec!(2000000));
    assert_eq!(payout(&result, "alice"), dec!(1500000));
    assert_eq!(payout(&result, "bob"), dec!(1500000));
    assert!(!result.per_holder[2].converted_to_common);
    assert_eq!(result.per_holder[2].multiple_on_investment, Some(dec!(1)));
}

#[test]
fn test_exit_below_preference_pays_investor_only() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let result = WaterfallEngine::default().run(&table, dec!(1000000)).unwrap();

    assert_eq!(payout(&result, "series-a:investor"), dec!(1000000));
    assert_eq!(payout(&result, "alice"), dec!(0));
    assert_eq!(payout(&result, "bob"), dec!(0));
}

#[test]
fn test_zero_exit_pays_nothing() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let result = WaterfallEngine::default().run(&table, dec!(0)).unwrap();
    assert!(result.per_holder.iter().all(|p| p.payout == dec!(0)));
    assert_eq!(result.total_distributed, dec!(0));
}

#[test]
fn test_negative_exit_and_empty_table_rejected() {
    let engine = WaterfallEngine::default();
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    assert_eq!(
        engine.run(&table, dec!(-1)).unwrap_err(),
        Error::NegativeExitValue(dec!(-1))
    );

    let empty = CapTableSnapshot::from_ledger(&ShareLedger::default());
    assert_eq!(engine.run(&empty, dec!(100)).unwrap_err(), Error::EmptyCapTable);
}

#[test]
fn test_capped_participation_low_exit() {
    let table = series_a_table(
        Series::new("series-a", 1, 2_000_000, dec!(2000000)).participating(Some(dec!(2))),
    );
    let result = WaterfallEngine::default().run(&table, dec!(5000000)).unwrap();

    // 1x preference plus 20% of the remaining 3M.
    assert_eq!(payout(&result, "series-a:investor"), dec!(2600000));
    assert_eq!(payout(&result, "alice"), dec!(1200000));
    let class = result.class_payout("series-a").unwrap();
    assert_eq!(class.preference_paid, dec!(2000000));
    assert_eq!(class.participation_paid, dec!(600000));
    assert!(!class.converted_to_common);
}

#[test]
fn test_capped_participation_binds_and_excess_goes_to_common() {
    let table = series_a_table(
        Series::new("series-a", 1, 2_000_000, dec!(2000000)).participating(Some(dec!(2))),
    );
    let engine = WaterfallEngine::default();

    let result = engine.run(&table, dec!(15000000)).unwrap();
    assert_eq!(payout(&result, "series-a:investor"), dec!(4000000));
    assert_eq!(payout(&result, "alice"), dec!(5500000));
    assert_eq!(payout(&result, "bob"), dec!(5500000));
    assert!(!result.per_holder[2].converted_to_common);

    // At the break-even exit converting is not strictly better, so the class keeps.
    let result = engine.run(&table, dec!(20000000)).unwrap();
    assert_eq!(payout(&result, "series-a:investor"), dec!(4000000));
    assert!(!result.per_holder[2].converted_to_common);

    let result = engine.run(&table, dec!(50000000)).unwrap();
    assert_eq!(payout(&result, "series-a:investor"), dec!(10000000));
    assert!(result.per_holder[2].converted_to_common);
}

#[test]
fn test_uncapped_participation_never_converts() {
    let table = series_a_table(
        Series::new("series-a", 1, 2_000_000, dec!(2000000)).participating(None),
    );
    let result = WaterfallEngine::default().run(&table, dec!(50000000)).unwrap();

    assert_eq!(payout(&result, "series-a:investor"), dec!(11600000));
    assert_eq!(payout(&result, "alice"), dec!(19200000));
    assert!(!result.per_holder[2].converted_to_common);
}

#[test]
fn test_most_senior_class_takes_everything_at_its_claim() {
    let table = cap_table(
        &[("alice", 4_000_000), ("bob", 4_000_000)],
        0,
        vec![
            Series::new("series-a", 1, 2_000_000, dec!(2000000)),
            Series::new("series-b", 2, 2_500_000, dec!(5000000)),
        ],
    );
    let result = WaterfallEngine::default().run(&table, dec!(5000000)).unwrap();

    assert_eq!(payout(&result, "series-b:investor"), dec!(5000000));
    assert_eq!(payout(&result, "series-a:investor"), dec!(0));
    assert_eq!(payout(&result, "alice"), dec!(0));
    assert_eq!(payout(&result, "bob"), dec!(0));
}

#[test]
fn test_oldest_first_tie_break_reorders_stack() {
    let table = cap_table(
        &[("alice", 4_000_000), ("bob", 4_000_000)],
        0,
        vec![
            Series::new("series-a", 1, 2_000_000, dec!(2000000)),
            Series::new("series-b", 2, 2_500_000, dec!(5000000)),
        ],
    );
    let engine = WaterfallEngine::new(EngineSettings {
        seniority_tie_break: SeniorityTieBreak::OldestFirst,
        ..EngineSettings::default()
    });
    let result = engine.run(&table, dec!(5000000)).unwrap();

    assert_eq!(payout(&result, "series-a:investor"), dec!(2000000));
    assert_eq!(payout(&result, "series-b:investor"), dec!(3000000));
    assert_eq!(payout(&result, "alice"), dec!(0));
}

#[test]
fn test_junior_converts_while_senior_keeps() {
    let table = cap_table(
        &[("alice", 4_000_000), ("bob", 4_000_000)],
        0,
        vec![
            Series::new("seed", 1, 1_000_000, dec!(1000000)),
            Series::new("series-a", 2, 1_000_000, dec!(10000000)),
        ],
    );
    let result = WaterfallEngine::default().run(&table, dec!(20000000)).unwrap();

    let seed = result.class_payout("seed").unwrap();
    let series_a = result.class_payout("series-a").unwrap();
    assert!(seed.converted_to_common);
    assert!(!series_a.converted_to_common);
    assert_eq!(payout(&result, "series-a:investor"), dec!(10000000));
    assert_close(payout(&result, "seed:investor"), dec!(1111111.111111));
    assert_close(payout(&result, "alice"), dec!(4444444.444444));
    assert_close(payout(&result, "bob"), dec!(4444444.444444));
    assert_eq!(result.total_distributed, dec!(20000000));
}

#[test]
fn test_rounding_dust_is_fully_distributed() {
    let table = cap_table(
        &[("a", 1_000_000), ("b", 1_000_000), ("c", 1_000_000)],
        333_333,
        vec![Series::new("seed", 1, 777_777, dec!(1234567.89)).participating(Some(dec!(3)))],
    );
    let exit = dec!(9876543.21);
    let result = WaterfallEngine::default().run(&table, exit).unwrap();

    assert_eq!(result.total_distributed, exit);
    let sum: Decimal = result.per_holder.iter().map(|p| p.payout).sum();
    assert_eq!(sum, exit);
    assert!(result.per_holder.iter().all(|p| p.payout >= dec!(0)));
}

#[test]
fn test_option_pool_shares_in_common_proceeds() {
    let table = cap_table(&[("alice", 8_000_000)], 2_000_000, vec![]);
    let result = WaterfallEngine::default().run(&table, dec!(10000000)).unwrap();

    assert_eq!(payout(&result, OPTION_POOL_ID), dec!(2000000));
    assert_eq!(payout(&result, "alice"), dec!(8000000));
    let pool = result.class_payout(OPTION_POOL_ID).unwrap();
    assert_eq!(pool.common_paid, dec!(2000000));
    assert!(!pool.converted_to_common);
}

#[test]
fn test_payout_curve_is_monotonic_for_every_holder() {
    let table = series_a_table(
        Series::new("series-a", 1, 2_000_000, dec!(2000000)).participating(Some(dec!(2))),
    );
    let exits = [
        dec!(0),
        dec!(1000000),
        dec!(5000000),
        dec!(15000000),
        dec!(20000000),
        dec!(20000001),
        dec!(50000000),
    ];
    let curve = WaterfallEngine::default().payout_curve(&table, &exits).unwrap();
    assert_eq!(curve.len(), exits.len());

    for pair in curve.windows(2) {
        for (low, high) in pair[0].per_holder.iter().zip(pair[1].per_holder.iter()) {
            assert!(high.payout >= low.payout, "{} decreased", low.holder_id);
        }
    }
}

#[test]
fn test_stack_missing_preferred_class_rejected() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let err = WaterfallEngine::default()
        .distribute(&table, &PreferenceStack::default(), dec!(100))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_invalid_terms_rejected() {
    let mut table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    if let crate::ledger::ShareClassKind::Preferred(terms) = &mut table.share_classes[1].kind {
        terms.liquidation_multiple = dec!(-1);
    }
    let err = WaterfallEngine::default().run(&table, dec!(100)).unwrap_err();
    assert!(matches!(err, Error::InvalidTerms { .. }));
}

fn junior_heavy_table() -> CapTableSnapshot {
    // r1 carries a large preference; the later, senior r2 bought in cheaply.
    cap_table(
        &[("alice", 100_000)],
        0,
        vec![
            Series::new("r1", 1, 100_000, dec!(250000000)),
            Series::new("r2", 2, 250_000, dec!(1000000)),
        ],
    )
}

#[test]
fn test_junior_keeps_preference_once_senior_converts() {
    let result = WaterfallEngine::default()
        .run(&junior_heavy_table(), dec!(660000000))
        .unwrap();

    assert!(!result.class_payout("r1").unwrap().converted_to_common);
    assert!(result.class_payout("r2").unwrap().converted_to_common);
    assert_eq!(payout(&result, "r1:investor"), dec!(250000000));
    assert_close(payout(&result, "r2:investor"), dec!(292857142.857143));
    assert_close(payout(&result, "alice"), dec!(117142857.142857));
    assert_eq!(result.total_distributed, dec!(660000000));
}

#[test]
fn test_payout_curve_is_monotonic_with_several_preferred_classes() {
    let exits = [
        dec!(0),
        dec!(500000),
        dec!(1000000),
        dec!(100000000),
        dec!(251000000),
        dec!(300000000),
        dec!(660000000),
        dec!(1000000000),
        dec!(1125000000),
        dec!(1200000000),
        dec!(5000000000),
    ];
    let curve = WaterfallEngine::default()
        .payout_curve(&junior_heavy_table(), &exits)
        .unwrap();

    for pair in curve.windows(2) {
        assert_eq!(pair[1].total_distributed, pair[1].exit_value);
        for (low, high) in pair[0].per_holder.iter().zip(pair[1].per_holder.iter()) {
            assert!(
                high.payout >= low.payout,
                "{} dropped from {} to {} between exits {} and {}",
                low.holder_id,
                low.payout,
                high.payout,
                pair[0].exit_value,
                pair[1].exit_value
            );
        }
    }
    assert_eq!(curve[10].converted_classes().count(), 2);
}

#[test]
fn test_huge_exit_does_not_overflow() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let exit = dec!(10000000000000000000000);
    let result = WaterfallEngine::default().run(&table, exit).unwrap();

    assert_eq!(payout(&result, "alice"), dec!(4000000000000000000000));
    assert_eq!(payout(&result, "series-a:investor"), dec!(2000000000000000000000));
    assert_eq!(result.total_distributed, exit);
}

#[test]
fn test_exit_finer_than_payout_precision_is_paid_in_full() {
    let table = series_a_table(Series::new("series-a", 1, 2_000_000, dec!(2000000)));
    let exit = dec!(0.0000004);
    let result = WaterfallEngine::default().run(&table, exit).unwrap();

    assert_eq!(result.total_distributed, exit);
    assert_eq!(payout(&result, "series-a:investor"), exit);
}
