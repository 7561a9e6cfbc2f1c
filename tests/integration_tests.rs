use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveDate;
use serde_json::{json, Value};
use sgr_intake::*;
use std::io::Cursor;
use tempfile::TempDir;

const APPLICANT: &str = "30888888885";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()
}

fn service(dir: &TempDir) -> IntakeService {
    let config = IntakeConfig {
        store_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    IntakeService::new(config).unwrap()
}

fn records(values: Vec<Value>) -> Vec<GridRecord> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

fn open(bytes: Vec<u8>) -> anyhow::Result<Xlsx<Cursor<Vec<u8>>>> {
    Ok(open_workbook_from_rs(Cursor::new(bytes))?)
}

fn float(cell: &Data) -> f64 {
    match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        other => panic!("expected a number, got {:?}", other),
    }
}

#[test]
fn test_shareholders_survive_save_and_reload() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let mut first = service(&dir);
    first.identify(APPLICANT)?;
    {
        let ledger = first.session_mut()?.state.filiatorios.get_or_init();
        ledger.append(Shareholder::new("Ana Pérez", "27111111112", 60.0))?;

        let rejected = ledger.append(Shareholder::new("Luis Gómez", "20222222223", 50.0));
        let error = rejected.unwrap_err();
        assert!(error
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::ShareCeilingExceeded { .. })));
        assert_eq!(ledger.len(), 1);

        ledger.append(Shareholder::new("Luis Gómez", "20222222223", 40.0))?;
        assert_eq!(ledger.share_status(), ShareStatus::Complete);
    }
    first.save()?;

    let mut second = service(&dir);
    let report = second.identify(APPLICANT)?.expect("stored progress");
    assert!(report.restored.contains(&"filiatorios".to_string()));

    let ledger = second.session().unwrap().state.filiatorios.get().unwrap();
    assert_eq!(ledger.len(), 2);
    assert!((ledger.share_total() - 100.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_empty_session_exports_every_sheet() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut service = service(&dir);
    service.identify(APPLICANT)?;

    let download = service.export(today())?;
    assert_eq!(download.file_name, "formulario_30888888885.xlsx");

    let mut workbook = open(download.bytes)?;
    let expected: Vec<String> = Sheet::ALL.iter().map(|s| s.name().to_string()).collect();
    assert_eq!(workbook.sheet_names(), expected);

    for sheet in Sheet::ALL {
        let range = workbook.worksheet_range(sheet.name())?;
        assert_eq!(range.height(), 1, "'{}' should only have a header", sheet.name());
        let header: Vec<String> = range
            .rows()
            .next()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        assert_eq!(header, sheet.columns(), "'{}' header", sheet.name());
    }
    Ok(())
}

#[test]
fn test_oversized_answer_is_truncated_not_fatal() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut service = service(&dir);
    service.identify(APPLICANT)?;
    service
        .session_mut()?
        .set_answer("Descripción", "x".repeat(40_000));

    let download = service.export(today())?;
    let mut workbook = open(download.bytes)?;
    assert_eq!(workbook.sheet_names().len(), Sheet::ALL.len());

    let range = workbook.worksheet_range("Resumen Info General")?;
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("Descripción".to_string())));
    match range.get_value((1, 0)) {
        Some(Data::String(text)) => assert_eq!(text.chars().count(), MAX_CELL_CHARS),
        other => panic!("expected the truncated answer, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_debt_summary_in_workbook() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut service = service(&dir);
    service.identify(APPLICANT)?;

    let session = service.session_mut()?;
    session.stage_grid(
        GridKind::BankDebts,
        records(vec![json!({
            "Entidad": "Banco Nación",
            "Saldo Préstamos Amortizables": 1000,
            "Adelanto en Cta Cte Utilizado": "500",
            "Tasa Promedio $": 30,
            "Tipo de Moneda": "ARS"
        })]),
    );
    session.commit_grid(GridKind::BankDebts)?;
    session.stage_grid(
        GridKind::CommercialDebts,
        records(vec![
            json!({ "A favor de": "Acopio", "Tipo de Moneda": "ARS", "Monto": 100, "Tasa": 10 }),
            json!({ "A favor de": "Semillera", "Tipo de Moneda": "ARS", "Monto": 300, "Tasa": 20 }),
        ]),
    );
    session.commit_grid(GridKind::CommercialDebts)?;

    let mut workbook = open(service.export(today())?.bytes)?;
    let range = workbook.worksheet_range("Resumen Deudas")?;
    let rows: Vec<&[Data]> = range.rows().skip(1).collect();

    let find = |category: &str| {
        rows.iter()
            .find(|r| r[0].to_string() == category && r[1].to_string() == "ARS")
            .copied()
    };

    let bank = find("Deuda Bancaria").expect("bank row");
    assert_eq!(float(&bank[2]), 1500.0);
    assert_eq!(float(&bank[3]), 30.0);

    let commercial = find("Deuda Comercial").expect("commercial row");
    assert_eq!(float(&commercial[2]), 400.0);
    assert!((float(&commercial[3]) - 17.5).abs() < 1e-9);

    let total = find("Total").expect("total row");
    assert_eq!(float(&total[2]), 1900.0);
    assert!((float(&total[3]) - (1500.0 * 30.0 + 400.0 * 17.5) / 1900.0).abs() < 1e-9);

    assert!(rows.iter().all(|r| r[1].to_string() != "USD"));
    Ok(())
}

#[test]
fn test_restore_is_idempotent_and_keeps_current_edits() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = ProgressStore::new(dir.path());
    let id = ApplicantId::parse(APPLICANT)?;

    let mut saved = ApplicantSession::new(id.clone());
    saved.set_answer("Razón Social", "Campo Viejo SA");
    saved.set_answer("Provincia", "Córdoba");
    saved
        .state
        .proveedores
        .get_or_init()
        .append(Supplier {
            name: "Agroquímicos del Sur".to_string(),
            tax_id: "30712345671".to_string(),
            purchases_pct: 35.0,
            ..Default::default()
        })?;
    store.save(&id, &saved.state)?;

    let mut current = ApplicantSession::new(id.clone());
    current.set_answer("Razón Social", "Campo Nuevo SA");

    let stored = store.load(&id)?.expect("saved snapshot");
    let first = merge_into_session(&stored.entries, &mut current);
    let after_first = current.state.clone();
    let second = merge_into_session(&stored.entries, &mut current);

    assert_eq!(current.state, after_first);
    assert!(first.restored.contains(&"proveedores".to_string()));
    assert!(second.restored.is_empty());
    assert_eq!(
        current.answer("Razón Social"),
        Some(&AnswerValue::from("Campo Nuevo SA"))
    );
    assert_eq!(current.answer("Provincia"), Some(&AnswerValue::from("Córdoba")));
    Ok(())
}

#[test]
fn test_full_state_round_trips() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = ProgressStore::new(dir.path());
    let id = ApplicantId::parse(APPLICANT)?;

    let mut session = ApplicantSession::new(id.clone());
    session.set_answer("Razón Social", "La Esperanza SRL");
    session.set_answer("Empleados", 12.0);
    session.set_answer("Exporta", true);
    session
        .state
        .avales
        .get_or_init()
        .append(Guarantee::new("Financiero", "", 2_500_000.0, "Prenda", ""))?;
    session.state.ventas_externo.set(Ledger::from_rows(vec![ExportSale(
        MonthlyRow::new(
            Month::Junio,
            Activity::Agro(AgroBranch::Agriculture),
            YearAmounts::new(1.5, 2.0, 0.0, 0.0),
        )
        .with_region("Mercosur"),
    )]));
    session
        .state
        .agricultura_por_campania
        .get_or_init()
        .slot_mut(CampaignSlot::Current)
        .add_crop("Colza")?;
    session.state.herd_mut(HerdKind::Feedlot).set("De Terceros", "Novillos", 120.0)?;
    session.state.indices_mut(HerdKind::Breeding).set("% Preñez", 91.0)?;
    session
        .sales_plan_mut(PlanActivity::Otros, Some("Miel"))?
        .set(Month::Octubre, "Miel", 800.0)?;
    session.transient.download_confirmed = true;

    store.save(&id, &session.state)?;

    let mut restored = ApplicantSession::new(id.clone());
    let stored = store.load(&id)?.expect("saved snapshot");
    let report = merge_into_session(&stored.entries, &mut restored);

    assert!(report.undecodable.is_empty());
    assert_eq!(restored.state, session.state);
    assert!(!restored.transient.download_confirmed);
    Ok(())
}

#[test]
fn test_legacy_snapshot_is_sanitized_on_restore() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let legacy = json!({
        "filiatorios": [
            { "Nombre y Apellido": "Ana Pérez", "CUIT / CUIL": "27111111112", "% Participación": 100 }
        ],
        "delete_filiatorio_0": true,
        "FormSubmitter:form_filiatorios-Agregar": true,
        "editor_bancos": { "edited_rows": {} },
        "nombres_visibles_campanias": { "actual": "24/25" },
        "bancos": "not a table"
    });
    std::fs::write(
        dir.path().join(format!("progreso_{}.json", APPLICANT)),
        serde_json::to_vec(&legacy)?,
    )?;

    let mut service = service(&dir);
    let report = service.identify(APPLICANT)?.expect("legacy progress");

    assert_eq!(report.restored, vec!["filiatorios".to_string()]);
    assert_eq!(report.skipped_transient.len(), 3);
    assert_eq!(report.ignored_unknown, vec!["nombres_visibles_campanias".to_string()]);
    assert_eq!(report.undecodable, vec!["bancos".to_string()]);
    assert_eq!(service.revision(), 0);

    let state = &service.session().unwrap().state;
    assert_eq!(state.filiatorios.get().unwrap().share_status(), ShareStatus::Complete);
    assert!(state.bancos.is_absent());
    Ok(())
}

#[test]
fn test_corrupt_snapshot_starts_fresh() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join(format!("progreso_{}.json", APPLICANT)), b"{ truncated")?;

    let mut service = service(&dir);
    assert!(service.identify(APPLICANT)?.is_none());
    assert!(service.session().unwrap().state.present_keys().is_empty());

    assert_eq!(service.save()?, 1);
    Ok(())
}

#[test]
fn test_monthly_window_and_duplicate_guard() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut service = service(&dir);
    service.identify(APPLICANT)?;

    let session = service.session_mut()?;
    session.stage_grid(
        GridKind::DomesticSales,
        records(vec![
            json!({ "Mes": "Enero", "Tipo": "INDUSTRIA", "Año en curso": 100 }),
            json!({ "Mes": "Marzo", "Tipo": "AGROPECUARIO", "Subtipo": "TAMBO", "Año en curso": "50" }),
            json!({ "Mes": "Enero", "Tipo": "INDUSTRIA", "Año en curso": 999 }),
        ]),
    );
    let report = session.commit_grid(GridKind::DomesticSales)?;
    assert_eq!(report.rows_accepted, 3);

    let ledger = session.state.ventas_interno.get().unwrap();
    let kept = dedup_months(ledger);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].amounts.current, 100.0);

    let summary = service.summary(today())?;
    let window = &summary.sales_window;
    assert_eq!(window.months.len(), 12);
    assert_eq!(window.values.len(), 12);

    let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mar = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    assert_eq!(window.value(jan, "Ventas Mercado Interno"), Some(100.0));
    assert_eq!(window.value(mar, "Total Ventas"), Some(50.0));

    let nonzero = window
        .values
        .iter()
        .filter(|row| row.iter().any(|v| *v != 0.0))
        .count();
    assert_eq!(nonzero, 2);

    // Sector totals count every row, duplicates included.
    let sectors = summary.sectors_of("Ventas Interno");
    let industry = sectors.iter().find(|s| s.sector == "INDUSTRIA").unwrap();
    assert_eq!(industry.amounts.current, 1099.0);
    Ok(())
}

#[test]
fn test_customer_and_competitor_deletes_are_independent() -> anyhow::Result<()> {
    let mut session = ApplicantSession::new(ApplicantId::parse(APPLICANT)?);
    let state = &mut session.state;

    state.proveedores.get_or_init().append(Supplier {
        name: "Semillas SA".to_string(),
        tax_id: "30700000001".to_string(),
        ..Default::default()
    })?;
    for name in ["Cooperativa Norte", "Molino Sur"] {
        state.clientes.get_or_init().append(Customer {
            name: name.to_string(),
            tax_id: "30700000002".to_string(),
            ..Default::default()
        })?;
    }
    state.competidores.get_or_init().append(Competitor {
        name: "Agro Rival".to_string(),
        tax_id: "30700000003".to_string(),
        ..Default::default()
    })?;

    let removed = state.clientes.get_or_init().remove(0)?;
    assert_eq!(removed.name, "Cooperativa Norte");
    assert_eq!(state.clientes.get().unwrap().len(), 1);
    assert_eq!(state.competidores.get().unwrap().len(), 1);
    assert_eq!(state.proveedores.get().unwrap().len(), 1);

    let removed = state.competidores.get_or_init().remove(0)?;
    assert_eq!(removed.name, "Agro Rival");
    assert_eq!(state.clientes.get().unwrap().len(), 1);

    assert!(state.competidores.get_or_init().discard(0).is_none());
    assert!(matches!(
        state.competidores.get_or_init().remove(0),
        Err(IntakeError::RowIndexOutOfBounds { .. })
    ));
    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema = PersistableState::schema_as_json().unwrap();
    assert!(schema.contains("ventas_interno"));
    assert!(schema.contains("Tipo de Moneda"));
    assert!(schema.contains("Cultivos"));
}
