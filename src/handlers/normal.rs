//! Normal distribution handler: interactive chart on a terminal, table otherwise.

use anyhow::Result;
use is_terminal::IsTerminal;

use crate::stats::Normal;
use crate::tui::run_normal_chart;

pub fn run(mean: f64, sd: f64) -> Result<()> {
    let normal = Normal::new(mean, sd);
    if std::io::stdout().is_terminal() {
        return run_normal_chart(normal);
    }

    println!("# mean={:.1} sd={:.1}", normal.mean(), normal.sd());
    println!("x\tdensity");
    for (x, y) in normal.curve() {
        println!("{:.1}\t{:.6}", x, y);
    }
    Ok(())
}
