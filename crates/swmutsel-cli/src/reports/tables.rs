use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use strum::IntoEnumIterator;
use swmutsel_core::code::{amino_acid_letter, GeneticCode, GeneticCodeKind};
use swmutsel_core::likelihood::site::ROOT_CLADE;
use swmutsel_core::likelihood::SiteEvaluator;
use swmutsel_core::optimizer::EstimationResult;
use swmutsel_core::Fitness;

pub fn site_fitness(site: &SiteEvaluator, fitness: &[Fitness], log_likelihood: f64) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("AA").add_attribute(Attribute::Bold),
        Cell::new("Observed"),
    ];
    let clades: Vec<&str> = std::iter::once(ROOT_CLADE)
        .chain(site.settings().clades.iter().map(String::as_str))
        .collect();
    header.extend(clades.iter().map(|c| Cell::new(c).fg(Color::Cyan)));
    table.add_row(header);

    for i in 2..2 + clades.len() {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for (k, &aa) in site.amino_acids().iter().enumerate() {
        let observed = site.observed().contains(&aa);
        let mut row = vec![
            Cell::new(amino_acid_letter(aa)).add_attribute(Attribute::Bold),
            Cell::new(if observed { "yes" } else { "" }),
        ];
        for f in fitness {
            let value = f.values.get(k).copied().unwrap_or(f64::NAN);
            let cell = Cell::new(format!("{:.4}", value));
            row.push(if observed { cell.fg(Color::Green) } else { cell });
        }
        table.add_row(row);
    }

    println!("\n=== SITE {} (lnL {:.4}) ===", site.index(), log_likelihood);
    println!("{}", table);
}

pub fn estimation_summary(result: &EstimationResult) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let p = &result.params;
    table.add_row(vec![
        Cell::new("lnL").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.4}", result.log_likelihood)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Iterations"),
        Cell::new(format!(
            "{}{}",
            result.iterations,
            if result.converged { " (converged)" } else { "" }
        )),
    ]);
    table.add_row(vec![Cell::new("tau"), Cell::new(format!("{:.6}", p.tau))]);
    table.add_row(vec![Cell::new("kappa"), Cell::new(format!("{:.6}", p.kappa))]);
    table.add_row(vec![
        Cell::new("pi (T,C,A,G)"),
        Cell::new(
            p.pi.iter()
                .map(|v| format!("{:.4}", v))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    ]);
    table.add_row(vec![Cell::new("mu"), Cell::new(format!("{:.6}", p.mu))]);
    table.add_row(vec![
        Cell::new("Tree length"),
        Cell::new(format!("{:.4}", result.tree.total_length())),
    ]);
    println!("{}", table);
}

pub fn genetic_codes() {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Sense codons"),
        Cell::new("Table (TCAG order)"),
    ]);
    for kind in GeneticCodeKind::iter() {
        let code = GeneticCode::new(kind);
        table.add_row(vec![
            Cell::new(kind.to_string()).fg(Color::Cyan),
            Cell::new(code.sense_codons().len()),
            Cell::new(kind.code_string()),
        ]);
    }
    println!("{}", table);
}
