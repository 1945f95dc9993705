mod common;

use common::{code, globals, globals_with};
use rstest::rstest;
use swmutsel_core::code::{amino_acid_index, GeneticCode};
use swmutsel_core::consts::{CODON_COUNT, CODON_MATRIX_SIZE};
use swmutsel_core::model::codon::CodonModel;
use swmutsel_core::{Fitness, MutationParams};

fn aa(letter: char) -> u8 {
    amino_acid_index(letter as u8).unwrap()
}

fn model(letters: &str, fitness: &[f64]) -> CodonModel {
    let amino_acids = letters.chars().map(aa).collect();
    CodonModel::new(globals(), Fitness::new(fitness.to_vec()), amino_acids).unwrap()
}

#[rstest]
#[case(0.0)]
#[case(0.01)]
#[case(0.5)]
#[case(3.0)]
fn test_probability_rows_sum_to_one(#[case] t: f64) {
    let m = model("ALSW", &[0.0, 1.2, -0.7, 2.5]);
    let mut p = vec![0.0; CODON_MATRIX_SIZE];
    m.probability_matrix(t, &mut p);
    for &i in m.site_codons() {
        let row: f64 = (0..CODON_COUNT).map(|j| p[i * CODON_COUNT + j]).sum();
        assert!((row - 1.0).abs() < 1e-8, "t = {t}, row {i} sums to {row}");
    }
}

#[test]
fn test_detailed_balance() {
    let m = model("ALSW", &[0.0, 1.2, -0.7, 2.5]);
    let mut p = vec![0.0; CODON_MATRIX_SIZE];
    m.probability_matrix(0.3, &mut p);
    for &i in m.site_codons() {
        for &j in m.site_codons() {
            let forward = m.equilibrium(i) * p[i * CODON_COUNT + j];
            let backward = m.equilibrium(j) * p[j * CODON_COUNT + i];
            assert!((forward - backward).abs() < 1e-10);
        }
    }
}

#[test]
fn test_equilibrium_follows_fitness() {
    let neutral = model("AL", &[0.0, 0.0]);
    let selected = model("AL", &[0.0, 2.0]);
    let leu = |m: &CodonModel| -> f64 {
        m.site_codons()
            .iter()
            .filter(|&&c| code().amino_acid_of(c) == Some(aa('L')))
            .map(|&c| m.equilibrium(c))
            .sum()
    };
    assert!(leu(&selected) > leu(&neutral));
    let total: f64 = selected.codon_pi().iter().sum();
    assert!((total - 1.0).abs() < 1e-12);
}

/// Phenylalanine has two codons one transition apart, so P(t) has the
/// closed form of a two-state chain.
#[test]
fn test_two_codon_space_matches_analytic_result() {
    let m = model("F", &[0.0]);
    assert_eq!(m.matrix_size(), 2);
    let q = m.rate_matrix();
    let (q01, q10) = (q[1], q[2]);
    let s = q01 + q10;
    let (c0, c1) = (m.site_codons()[0], m.site_codons()[1]);

    let mut p = vec![0.0; CODON_MATRIX_SIZE];
    for t in [0.05, 0.4, 2.0] {
        m.probability_matrix(t, &mut p);
        let expected = q01 / s * (1.0 - (-s * t).exp());
        assert!((p[c0 * CODON_COUNT + c1] - expected).abs() < 1e-10, "t = {t}");
        assert!((p[c0 * CODON_COUNT + c0] - (1.0 - expected)).abs() < 1e-10);
    }
}

#[test]
fn test_zero_tau_forbids_double_changes() {
    let g = globals_with(MutationParams {
        tau: 0.0,
        ..Default::default()
    });
    let ttt = GeneticCode::codon_from_str(b"TTT").unwrap();
    let tcc = GeneticCode::codon_from_str(b"TCC").unwrap();
    let ttc = GeneticCode::codon_from_str(b"TTC").unwrap();
    assert_eq!(g.neutral_rate(ttt, tcc), 0.0);
    assert!(g.neutral_rate(ttt, ttc) > 0.0);
}

#[test]
fn test_mutation_process_is_normalised() {
    let g = globals();
    let code = code();
    let mut expected = 0.0;
    for &i in code.sense_codons() {
        for &j in code.sense_codons() {
            if i != j {
                expected += g.codon_equilibrium(i) * g.neutral_rate(i, j);
            }
        }
    }
    assert!((expected * g.nu() - 1.0).abs() < 1e-9, "{expected}");
}

#[test]
fn test_updated_model_is_a_fresh_snapshot() {
    let m = model("AL", &[0.0, 0.0]);
    let updated = m.update_model(Fitness::new(vec![0.0, 3.0])).unwrap();
    assert_eq!(m.fitness().values, vec![0.0, 0.0]);
    assert_eq!(updated.fitness().values, vec![0.0, 3.0]);
    assert!(CodonModel::new(globals(), Fitness::new(vec![0.0]), vec![aa('A'), aa('L')]).is_err());
}

#[test]
fn test_zero_length_branch_is_identity() {
    let m = model("ALSW", &[0.0, 1.2, -0.7, 2.5]);
    let mut p = vec![0.0; CODON_MATRIX_SIZE];
    m.probability_matrix(0.0, &mut p);
    for &i in m.site_codons() {
        for &j in m.site_codons() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((p[i * CODON_COUNT + j] - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn test_rebuilding_with_same_inputs_is_bit_identical() {
    let m = model("ALSW", &[0.0, 1.2, -0.7, 2.5]);
    let again = m.update_model(m.fitness().clone()).unwrap();
    assert_eq!(m.rate_matrix(), again.rate_matrix());
    assert_eq!(m.eigenvalues(), again.eigenvalues());
    let mut a = vec![0.0; CODON_MATRIX_SIZE];
    let mut b = vec![0.0; CODON_MATRIX_SIZE];
    m.probability_matrix(0.7, &mut a);
    again.probability_matrix(0.7, &mut b);
    assert_eq!(a, b);
}

#[rstest]
#[case(20.0)]
#[case(-20.0)]
fn test_fitness_at_bound_stays_finite(#[case] bound: f64) {
    let m = model("AW", &[0.0, bound]);
    let mut p = vec![0.0; CODON_MATRIX_SIZE];
    m.probability_matrix(1.0, &mut p);
    assert!(p.iter().all(|v| v.is_finite()));
    assert!(m.codon_pi().iter().all(|v| v.is_finite()));
}

#[rstest]
#[case("ALSW", &[0.0, 0.0, 0.0, 0.0])]
#[case("ALSW", &[0.0, 1.2, -0.7, 2.5])]
#[case("DEKR", &[0.0, -20.0, 20.0, 5.0])]
#[case("F", &[0.0])]
fn test_rate_matrix_rows_sum_to_zero(#[case] letters: &str, #[case] fitness: &[f64]) {
    let m = model(letters, fitness);
    let n = m.matrix_size();
    let q = m.rate_matrix();
    assert_eq!(q.len(), n * n);
    for i in 0..n {
        let row: f64 = q[i * n..(i + 1) * n].iter().sum();
        let scale = q[i * n + i].abs().max(1.0);
        assert!(row.abs() < 1e-12 * scale, "row {i} sums to {row}");
        assert!(q[i * n..(i + 1) * n]
            .iter()
            .enumerate()
            .all(|(j, &v)| j == i || v >= 0.0));
    }
}
