//! Built-in field tables.
//!
//! Heart follows the UCI heart-disease encoding, diabetes the Pima Indians
//! encoding. General is an optional lab panel with no model behind it.

use super::types::{CategoryOption, DataType, FieldDefinition, Task, UnitConversion, ValueRange};

/// Model output label that means "elevated risk" for the task.
pub fn adverse_class_label(task: Task) -> u8 {
    match task {
        // target = 1 means disease present
        Task::Heart => 1,
        // Outcome = 1 means diabetic
        Task::Diabetes => 1,
        Task::General => 1,
    }
}

pub fn requires_model(task: Task) -> bool {
    !matches!(task, Task::General)
}

pub fn definitions(task: Task) -> Vec<FieldDefinition> {
    match task {
        Task::Heart => heart(),
        Task::Diabetes => diabetes(),
        Task::General => general(),
    }
}

// ── builders ────────────────────────────────────────────────

struct Def(FieldDefinition);

impl Def {
    fn numeric(name: &str, unit: &str, synonyms: &[&str]) -> Self {
        Self(FieldDefinition {
            name: name.into(),
            data_type: DataType::Numeric,
            unit: (!unit.is_empty()).then(|| unit.to_string()),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            reference_range: None,
            required: false,
            plausible_range: None,
            unit_conversions: Vec::new(),
            categories: Vec::new(),
        })
    }

    fn categorical(name: &str, synonyms: &[&str], options: &[(&str, &[&str])]) -> Self {
        let mut def = Self::numeric(name, "", synonyms);
        def.0.data_type = DataType::Categorical;
        def.0.categories = options
            .iter()
            .map(|(code, labels)| CategoryOption {
                code: code.to_string(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
            })
            .collect();
        def
    }

    fn boolean(name: &str, synonyms: &[&str]) -> Self {
        let mut def = Self::numeric(name, "", synonyms);
        def.0.data_type = DataType::Boolean;
        def
    }

    fn range(mut self, min: f64, max: f64) -> Self {
        self.0.reference_range = Some(ValueRange::new(min, max));
        self
    }

    fn plausible(mut self, min: f64, max: f64) -> Self {
        self.0.plausible_range = Some(ValueRange::new(min, max));
        self
    }

    fn convert(mut self, unit: &str, factor: f64) -> Self {
        self.0.unit_conversions.push(UnitConversion {
            unit: unit.into(),
            factor,
        });
        self
    }

    fn required(mut self) -> Self {
        self.0.required = true;
        self
    }

    fn years(self) -> Self {
        self.convert("years", 1.0)
            .convert("year", 1.0)
            .convert("yrs", 1.0)
            .convert("yr", 1.0)
            .convert("y", 1.0)
            .convert("yo", 1.0)
    }

    fn mmhg(self) -> Self {
        self.convert("mmhg", 1.0).convert("kpa", 7.500_62)
    }
}

// ── heart ───────────────────────────────────────────────────

fn heart() -> Vec<FieldDefinition> {
    vec![
        Def::numeric("age", "years", &["age", "patient age", "aged"])
            .range(0.0, 120.0)
            .plausible(0.0, 120.0)
            .years()
            .required(),
        Def::categorical(
            "sex",
            &["sex", "gender"],
            &[("1", &["male", "m", "man"]), ("0", &["female", "f", "woman"])],
        )
        .required(),
        Def::categorical(
            "cp",
            &["chest pain type", "chest pain", "cp"],
            &[
                ("0", &["typical angina", "typical"]),
                ("1", &["atypical angina", "atypical"]),
                ("2", &["non-anginal pain", "non-anginal", "non anginal pain"]),
                ("3", &["asymptomatic"]),
            ],
        )
        .required(),
        Def::numeric(
            "trestbps",
            "mmHg",
            &[
                "resting blood pressure",
                "resting bp",
                "systolic blood pressure",
                "blood pressure",
                "bp",
                "trestbps",
            ],
        )
        .range(90.0, 120.0)
        .plausible(50.0, 300.0)
        .mmhg()
        .required(),
        Def::numeric(
            "chol",
            "mg/dL",
            &["cholesterol", "total cholesterol", "serum cholesterol", "chol"],
        )
        .range(125.0, 200.0)
        .plausible(50.0, 800.0)
        .convert("mg/dl", 1.0)
        .convert("mmol/l", 38.67)
        .required(),
        Def::boolean(
            "fbs",
            &["fasting blood sugar > 120 mg/dl", "fasting blood sugar > 120", "fbs"],
        ),
        Def::categorical(
            "restecg",
            &[
                "resting electrocardiographic results",
                "resting ecg",
                "resting ekg",
                "restecg",
            ],
            &[
                ("0", &["normal"]),
                ("1", &["st-t wave abnormality", "st-t abnormality", "st-t"]),
                ("2", &["left ventricular hypertrophy", "lvh"]),
            ],
        ),
        Def::numeric(
            "thalach",
            "bpm",
            &[
                "maximum heart rate achieved",
                "maximum heart rate",
                "max heart rate",
                "peak heart rate",
                "thalach",
            ],
        )
        .range(100.0, 200.0)
        .plausible(30.0, 250.0)
        .convert("bpm", 1.0)
        .convert("beats/min", 1.0)
        .required(),
        Def::boolean(
            "exang",
            &["exercise induced angina", "exercise-induced angina", "exang"],
        ),
        Def::numeric("oldpeak", "mm", &["st depression", "oldpeak"])
            .range(0.0, 1.0)
            .plausible(-5.0, 10.0)
            .convert("mm", 1.0),
        Def::categorical(
            "slope",
            &["slope of peak exercise st segment", "st slope", "slope"],
            &[
                ("0", &["upsloping", "up-sloping"]),
                ("1", &["flat"]),
                ("2", &["downsloping", "down-sloping"]),
            ],
        ),
        Def::numeric(
            "ca",
            "",
            &[
                "number of major vessels",
                "major vessels colored by fluoroscopy",
                "major vessels",
            ],
        )
        .plausible(0.0, 4.0),
        Def::categorical(
            "thal",
            &["thalassemia", "thallium stress test", "thal"],
            &[
                ("1", &["normal"]),
                ("2", &["fixed defect", "fixed"]),
                ("3", &["reversible defect", "reversable defect", "reversible"]),
            ],
        ),
    ]
    .into_iter()
    .map(|d| d.0)
    .collect()
}

// ── diabetes ────────────────────────────────────────────────

fn diabetes() -> Vec<FieldDefinition> {
    vec![
        Def::numeric("pregnancies", "", &["number of pregnancies", "pregnancies", "gravida"])
            .plausible(0.0, 20.0),
        Def::numeric(
            "glucose",
            "mg/dL",
            &["plasma glucose", "blood glucose", "glucose", "blood sugar"],
        )
        .range(70.0, 140.0)
        .plausible(10.0, 1000.0)
        .convert("mg/dl", 1.0)
        .convert("mmol/l", 18.016)
        .required(),
        Def::numeric(
            "blood_pressure",
            "mmHg",
            &["diastolic blood pressure", "diastolic bp", "diastolic"],
        )
        .range(60.0, 80.0)
        .plausible(20.0, 200.0)
        .mmhg()
        .required(),
        Def::numeric(
            "skin_thickness",
            "mm",
            &["triceps skinfold thickness", "triceps skin fold", "skin thickness"],
        )
        .range(10.0, 50.0)
        .plausible(1.0, 120.0)
        .convert("mm", 1.0)
        .convert("cm", 10.0),
        Def::numeric("insulin", "uU/mL", &["2-hour serum insulin", "serum insulin", "insulin"])
            .range(16.0, 166.0)
            .plausible(0.0, 1500.0)
            .convert("uu/ml", 1.0)
            .convert("uiu/ml", 1.0)
            .convert("mu/l", 1.0)
            .convert("miu/l", 1.0)
            .convert("pmol/l", 0.144),
        Def::numeric("bmi", "kg/m2", &["body mass index", "bmi"])
            .range(18.5, 24.9)
            .plausible(8.0, 90.0)
            .convert("kg/m2", 1.0)
            .convert("kg/m^2", 1.0)
            .convert("kg/m²", 1.0)
            .required(),
        Def::numeric(
            "diabetes_pedigree_function",
            "",
            &["diabetes pedigree function", "pedigree function", "dpf"],
        )
        .plausible(0.0, 3.0),
        Def::numeric("age", "years", &["age", "patient age", "aged"])
            .range(0.0, 120.0)
            .plausible(0.0, 120.0)
            .years()
            .required(),
    ]
    .into_iter()
    .map(|d| d.0)
    .collect()
}

// ── general ─────────────────────────────────────────────────

fn general() -> Vec<FieldDefinition> {
    vec![
        Def::numeric("glucose", "mg/dL", &["fasting glucose", "blood glucose", "glucose"])
            .range(70.0, 99.0)
            .plausible(10.0, 1000.0)
            .convert("mg/dl", 1.0)
            .convert("mmol/l", 18.016),
        Def::numeric("hba1c", "%", &["hemoglobin a1c", "glycated hemoglobin", "hba1c", "a1c"])
            .range(4.0, 5.6)
            .plausible(2.0, 20.0)
            .convert("%", 1.0),
        Def::numeric("total_cholesterol", "mg/dL", &["total cholesterol", "cholesterol"])
            .range(125.0, 200.0)
            .plausible(50.0, 800.0)
            .convert("mg/dl", 1.0)
            .convert("mmol/l", 38.67),
        Def::numeric("hdl", "mg/dL", &["hdl cholesterol", "hdl-c", "hdl"])
            .range(40.0, 100.0)
            .plausible(5.0, 200.0)
            .convert("mg/dl", 1.0)
            .convert("mmol/l", 38.67),
        Def::numeric("ldl", "mg/dL", &["ldl cholesterol", "ldl-c", "ldl"])
            .range(0.0, 100.0)
            .plausible(5.0, 600.0)
            .convert("mg/dl", 1.0)
            .convert("mmol/l", 38.67),
        Def::numeric("triglycerides", "mg/dL", &["triglycerides", "trigs", "tg"])
            .range(0.0, 150.0)
            .plausible(10.0, 5000.0)
            .convert("mg/dl", 1.0)
            .convert("mmol/l", 88.57),
        Def::numeric("hemoglobin", "g/dL", &["hemoglobin", "haemoglobin", "hgb", "hb"])
            .range(12.0, 17.5)
            .plausible(1.0, 25.0)
            .convert("g/dl", 1.0)
            .convert("g/l", 0.1),
        Def::numeric("creatinine", "mg/dL", &["serum creatinine", "creatinine"])
            .range(0.6, 1.3)
            .plausible(0.05, 25.0)
            .convert("mg/dl", 1.0)
            .convert("umol/l", 0.011_31),
        Def::numeric("sodium", "mmol/L", &["sodium", "na"])
            .range(135.0, 145.0)
            .plausible(80.0, 200.0)
            .convert("mmol/l", 1.0)
            .convert("meq/l", 1.0),
        Def::numeric("potassium", "mmol/L", &["potassium", "k"])
            .range(3.5, 5.1)
            .plausible(0.5, 15.0)
            .convert("mmol/l", 1.0)
            .convert("meq/l", 1.0),
        Def::numeric("heart_rate", "bpm", &["resting heart rate", "heart rate", "pulse"])
            .range(60.0, 100.0)
            .plausible(20.0, 250.0)
            .convert("bpm", 1.0)
            .convert("beats/min", 1.0),
        Def::numeric(
            "systolic_bp",
            "mmHg",
            &["systolic blood pressure", "systolic bp", "systolic", "blood pressure", "bp"],
        )
        .range(90.0, 120.0)
        .plausible(50.0, 300.0)
        .mmhg(),
        Def::numeric(
            "diastolic_bp",
            "mmHg",
            &["diastolic blood pressure", "diastolic bp", "diastolic"],
        )
        .range(60.0, 80.0)
        .plausible(20.0, 200.0)
        .mmhg(),
        Def::numeric("bmi", "kg/m2", &["body mass index", "bmi"])
            .range(18.5, 24.9)
            .plausible(8.0, 90.0)
            .convert("kg/m2", 1.0)
            .convert("kg/m^2", 1.0)
            .convert("kg/m²", 1.0),
        Def::numeric("weight", "kg", &["body weight", "weight"])
            .plausible(1.0, 400.0)
            .convert("kg", 1.0)
            .convert("kgs", 1.0)
            .convert("lb", 0.453_592)
            .convert("lbs", 0.453_592),
        Def::numeric("height", "cm", &["height"])
            .plausible(30.0, 250.0)
            .convert("cm", 1.0)
            .convert("m", 100.0)
            .convert("in", 2.54)
            .convert("inches", 2.54),
        Def::numeric("tsh", "mIU/L", &["thyroid stimulating hormone", "tsh"])
            .range(0.4, 4.0)
            .plausible(0.01, 200.0)
            .convert("miu/l", 1.0)
            .convert("uiu/ml", 1.0)
            .convert("mu/l", 1.0),
    ]
    .into_iter()
    .map(|d| d.0)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_has_fields() {
        for task in Task::ALL {
            assert!(!definitions(task).is_empty(), "{task} has no fields");
        }
    }

    #[test]
    fn field_names_unique_per_task() {
        for task in Task::ALL {
            let defs = definitions(task);
            let mut names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
            names.sort();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate field in {task}");
        }
    }

    #[test]
    fn general_has_no_required_fields() {
        assert!(definitions(Task::General).iter().all(|d| !d.required));
        assert!(!requires_model(Task::General));
        assert!(requires_model(Task::Heart));
    }

    #[test]
    fn reference_ranges_are_valid() {
        for task in Task::ALL {
            for def in definitions(task) {
                if let Some(r) = def.reference_range {
                    assert!(r.is_valid(), "{task}.{} has invalid range", def.name);
                }
            }
        }
    }
}
