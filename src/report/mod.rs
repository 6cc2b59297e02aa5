//! Text output for the CLI frontend.
//!
//! Writes an operating point or a sweep to any [`Write`] sink, either as a
//! boxed table or as CSV.

use std::io::{self, Write};

use comfy_table::{
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table,
};

use crate::error::{MosdcError, Result};
use crate::solver::{DeviceSample, OperatingPoint, SweepSample};

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Csv,
}

fn output_error(e: io::Error) -> MosdcError {
    MosdcError::OutputError {
        message: e.to_string(),
    }
}

fn region_label(device: &DeviceSample) -> String {
    device
        .region
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn table<T: Into<Cell>>(header: Vec<T>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn number(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Column label for a node's through current.
fn current_label(node: &str) -> String {
    format!("I({})", node)
}

/// Write a single operating point.
pub fn write_operating_point<W: Write>(out: &mut W, op: &OperatingPoint, format: Format) -> Result<()> {
    write_point(out, op, format).map_err(output_error)
}

fn write_point<W: Write>(out: &mut W, op: &OperatingPoint, format: Format) -> io::Result<()> {
    match format {
        Format::Csv => {
            writeln!(out, "kind,name,voltage,current,region,gm")?;
            for n in &op.nodes {
                writeln!(out, "node,{},{:e},{:e},,", n.name, n.voltage, n.current)?;
            }
            for d in &op.devices {
                let gm = d.gm.map(|g| format!("{:e}", g)).unwrap_or_default();
                let region = d.region.map(|r| r.to_string()).unwrap_or_default();
                writeln!(out, "device,{},,{:e},{},{}", d.name, d.current, region, gm)?;
            }
        }
        Format::Table => {
            writeln!(out, "Operating point ({} passes)", op.passes)?;

            let mut nodes = table(vec!["node", "voltage (V)", "current (A)"]);
            for n in &op.nodes {
                nodes.add_row(vec![
                    Cell::new(&n.name),
                    number(format!("{:.6}", n.voltage)),
                    number(format!("{:.6e}", n.current)),
                ]);
            }
            writeln!(out, "{nodes}")?;

            let mut devices = table(vec!["device", "current (A)", "region", "gm (A/V)"]);
            for d in &op.devices {
                let gm = d.gm.map(|g| format!("{:.6e}", g)).unwrap_or_else(|| "-".to_string());
                devices.add_row(vec![
                    Cell::new(&d.name),
                    number(format!("{:.6e}", d.current)),
                    Cell::new(region_label(d)),
                    number(gm),
                ]);
            }
            writeln!(out, "{devices}")?;
        }
    }
    Ok(())
}

/// Write one row per sweep sample: the swept value, every node voltage, then
/// every node's through current.
pub fn write_sweep<W: Write>(
    out: &mut W,
    target: &str,
    samples: &[SweepSample],
    format: Format,
) -> Result<()> {
    write_rows(out, target, samples, format).map_err(output_error)
}

fn write_rows<W: Write>(
    out: &mut W,
    target: &str,
    samples: &[SweepSample],
    format: Format,
) -> io::Result<()> {
    let names: Vec<&str> = samples
        .first()
        .map(|s| s.point.nodes.iter().map(|n| n.name.as_str()).collect())
        .unwrap_or_default();

    let mut header = vec![target.to_string()];
    header.extend(names.iter().map(|n| n.to_string()));
    header.extend(names.iter().map(|n| current_label(n)));

    match format {
        Format::Csv => {
            writeln!(out, "{}", header.join(","))?;
            for s in samples {
                let mut row = vec![format!("{:e}", s.input)];
                row.extend(s.point.nodes.iter().map(|n| format!("{:e}", n.voltage)));
                row.extend(s.point.nodes.iter().map(|n| format!("{:e}", n.current)));
                writeln!(out, "{}", row.join(","))?;
            }
        }
        Format::Table => {
            let mut rows = table(header);
            for s in samples {
                let mut row = vec![number(format!("{:.6}", s.input))];
                row.extend(s.point.nodes.iter().map(|n| number(format!("{:.6}", n.voltage))));
                row.extend(s.point.nodes.iter().map(|n| number(format!("{:.6e}", n.current))));
                rows.add_row(row);
            }
            writeln!(out, "{rows}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Region;
    use crate::solver::{DeviceSample, NodeSample};

    fn point(v: f64) -> OperatingPoint {
        OperatingPoint {
            nodes: vec![NodeSample {
                name: "out".to_string(),
                voltage: v,
                current: 1e-3,
            }],
            devices: vec![
                DeviceSample {
                    name: "M1".to_string(),
                    current: 1e-3,
                    region: Some(Region::Saturation),
                    gm: Some(4e-3),
                },
                DeviceSample {
                    name: "R1".to_string(),
                    current: 1e-3,
                    region: None,
                    gm: None,
                },
            ],
            passes: 2,
        }
    }

    #[test]
    fn test_operating_point_csv() {
        let mut buf = Vec::new();
        write_operating_point(&mut buf, &point(2.5), Format::Csv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "kind,name,voltage,current,region,gm");
        assert_eq!(lines[1], "node,out,2.5e0,1e-3,,");
        assert_eq!(lines[2], "device,M1,,1e-3,saturation,4e-3");
        assert_eq!(lines[3], "device,R1,,1e-3,,");
    }

    #[test]
    fn test_operating_point_table() {
        let mut buf = Vec::new();
        write_operating_point(&mut buf, &point(2.5), Format::Table).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Operating point (2 passes)"));
        assert!(text.contains("saturation"));
        assert!(text.contains("2.500000"));
        assert!(text.contains("4.000000e-3"));
        // Boxed with rounded corners, one box per section.
        assert_eq!(text.matches('╭').count(), 2);
        let header = text.lines().find(|l| l.contains("voltage (V)")).unwrap();
        assert!(header.contains("node") && header.contains("current (A)"));
    }

    #[test]
    fn test_sweep_csv() {
        let samples = vec![
            SweepSample {
                input: 0.0,
                point: point(5.0),
            },
            SweepSample {
                input: 1.0,
                point: point(0.5),
            },
        ];
        let mut buf = Vec::new();
        write_sweep(&mut buf, "in", &samples, Format::Csv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "in,out,I(out)\n0e0,5e0,1e-3\n1e0,5e-1,1e-3\n");
    }

    #[test]
    fn test_sweep_table_has_current_columns() {
        let samples = vec![SweepSample {
            input: 0.5,
            point: point(4.0),
        }];
        let mut buf = Vec::new();
        write_sweep(&mut buf, "in", &samples, Format::Table).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header = text.lines().find(|l| l.contains("I(out)")).unwrap();
        assert!(header.find("out").unwrap() < header.find("I(out)").unwrap());
        assert!(text.contains("0.500000"));
        assert!(text.contains("4.000000"));
        assert!(text.contains("1.000000e-3"));
    }
}
