use arada_bingo::config::RoundConfig;
use arada_bingo::games::{Card, DrawSeed, DrawState, RandomDraw, Round};
use arada_bingo::{CardSelection, WinPattern};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn seated_round(players: u32, pattern: WinPattern) -> Round {
    let config = RoundConfig {
        min_players: 1,
        max_cards_per_player: 1,
        win_pattern: pattern,
        ..Default::default()
    };
    let mut round = Round::with_seed(1, "bench".to_string(), config, DrawSeed::from_bytes([42u8; 32]));
    for card_number in 1..=players {
        let player = format!("player-{}", card_number);
        let card = round
            .prepare_card(&player, &CardSelection::catalogue(card_number), 10)
            .expect("valid registration");
        round.admit(&player, card, 10).expect("seat free");
    }
    round.start().expect("enough players");
    round
}

fn full_draw(c: &mut Criterion) {
    c.bench_function("draw_all_90", |b| {
        b.iter(|| {
            let mut draw = RandomDraw::from_seed(&DrawSeed::from_bytes([7u8; 32]));
            let mut state = DrawState::new();
            while let Ok(number) = draw.next(&mut state) {
                black_box(number);
            }
        })
    });
}

fn round_to_win(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_to_win");
    for players in [3u32, 30, 300] {
        group.bench_function(BenchmarkId::new("any_line", players), |b| {
            b.iter_batched(
                || seated_round(players, WinPattern::AnyLine),
                |mut round| loop {
                    match round.draw_next() {
                        Ok(outcome) if outcome.is_finished() => break black_box(outcome),
                        Ok(_) => continue,
                        Err(e) => panic!("draw failed: {e}"),
                    }
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn card_evaluation(c: &mut Criterion) {
    let mut card = Card::from_catalogue(11);
    let numbers = *card.numbers();
    for &number in numbers.iter().step_by(2) {
        card.mark(number);
    }
    c.bench_function("winning_line_full_card", |b| {
        b.iter(|| black_box(card.winning_line(WinPattern::FullCard)))
    });
}

criterion_group!(benches, full_draw, round_to_win, card_evaluation);
criterion_main!(benches);
