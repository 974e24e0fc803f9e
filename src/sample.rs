use chrono::{Duration, NaiveDate};

use crate::models::ServiceRequest;

const CATEGORIES: [(&str, u32); 6] = [
    ("Austin Code - Request Code Officer", 5),
    ("Loose Dog", 4),
    ("Animal Control - Assistance Request", 3),
    ("Graffiti Abatement", 2),
    ("Traffic Signal - Maintenance", 2),
    ("Pothole Repair", 1),
];

const DAYS: i64 = 120;

pub fn requests() -> Vec<ServiceRequest> {
    let Some(start) = NaiveDate::from_ymd_opt(2021, 3, 1) else {
        return Vec::new();
    };

    let mut requests = Vec::new();
    for day in 0..DAYS {
        let date = start + Duration::days(day);
        for (index, (category, weight)) in CATEGORIES.iter().enumerate() {
            let per_day = if (day as usize + index) % 3 == 0 {
                *weight
            } else {
                weight / 2
            };
            for n in 0..per_day {
                let Some(created_date) = date.and_hms_opt(8 + n, (index as u32 * 7) % 60, 0)
                else {
                    continue;
                };
                requests.push(ServiceRequest {
                    unique_key: format!("seed-{index}-{day}-{n}"),
                    complaint_description: category.to_string(),
                    created_date,
                });
            }
        }
    }

    requests
}
