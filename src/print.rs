use stanza::style::HAlign::Left;
use stanza::style::{HAlign, Header, MinWidth, Styles};
use stanza::table::{Col, Row, Table};

use crate::domain::{Pick, Score};
use crate::probs;

pub fn tabulate_picks(picks: &[Pick]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(24)).with(Left)),
            Col::new(Styles::default().with(MinWidth(7)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(7)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(7)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(6)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(10)).with(Left)),
            Col::new(Styles::default().with(MinWidth(7)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec![
                "Market".into(),
                "Price".into(),
                "Model".into(),
                "Edge".into(),
                "Score".into(),
                "Action".into(),
                "Stake%".into(),
            ],
        ));
    for pick in picks {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{}", pick.market).into(),
                format!("{:.2}", pick.quoted_price).into(),
                format!("{:.3}", pick.model_prob).into(),
                format!("{:+.3}", pick.edge).into(),
                format!("{:.0}", pick.final_score).into(),
                format!("{:?}", pick.action).into(),
                format!("{:.2}", pick.stake * 100.0).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_scorelines(scorelines: &[(Score, f64)]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(9)).with(Left)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(9)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec!["Score".into(), "Prob".into(), "Fair odds".into()],
        ));
    for (score, prob) in scorelines {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{}-{}", score.home, score.away).into(),
                format!("{:.3}", prob).into(),
                format!("{:.2}", probs::fair_price(*prob)).into(),
            ],
        ));
    }
    table
}
